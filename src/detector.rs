use crate::config::MonitoringConfig;
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;

use tracing::debug;

/// Source of person boxes, typically a neural network behind some runtime.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    #[inline]
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error> {
        (**self).detect(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionFilter {
    pub confidence_threshold: f32,
    pub min_bbox_area: f32,
}

impl DetectionFilter {
    pub fn new(confidence_threshold: f32, min_bbox_area: f32) -> Self {
        Self {
            confidence_threshold,
            min_bbox_area,
        }
    }

    pub fn from_config(config: &MonitoringConfig) -> Self {
        Self::new(config.confidence_threshold, config.min_bbox_area)
    }

    /// Clamps boxes into a `width` x `height` frame and drops the ones that
    /// end up empty, too small or not confident enough.
    pub fn apply(&self, detections: &[Detection], (width, height): (u32, u32)) -> Vec<Detection> {
        let res: Vec<_> = detections
            .iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .filter_map(|d| {
                let b = d.bbox().clamped(width, height);

                if b.right() <= b.left() || b.bottom() <= b.top() {
                    return None;
                }

                if b.area() < self.min_bbox_area {
                    return None;
                }

                Some(Detection::new(b.left(), b.top(), b.right(), b.bottom(), d.confidence))
            })
            .collect();

        debug!("Detected {} persons", res.len());

        res
    }
}
