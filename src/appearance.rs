//! Adapter for appearance based trackers living outside this crate.

use tracing::{error, info, warn};

use crate::bbox::{BBox, Ltrb, Ltwh};
use crate::config::MonitoringConfig;
use crate::error::Error;
use crate::geometry::GeometryProcessor;
use crate::tracker::CentroidTracker;
use crate::{Detection, Frame, Track, Tracking};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendTrack {
    pub track_id: u64,
    pub bbox: BBox<Ltrb>,
    pub confirmed: bool,
}

/// A tracker that associates boxes by appearance, fed with `(ltwh, confidence)`
/// pairs and the frame they were found in.
pub trait AppearanceBackend {
    fn configure(&mut self, max_age: u32, n_init: u32) -> Result<(), Error>;

    fn update(
        &mut self,
        detections: &[(BBox<Ltwh>, f32)],
        frame: Option<&Frame>,
    ) -> Result<Vec<BackendTrack>, Error>;
}

impl<B: AppearanceBackend + ?Sized> AppearanceBackend for Box<B> {
    #[inline]
    fn configure(&mut self, max_age: u32, n_init: u32) -> Result<(), Error> {
        (**self).configure(max_age, n_init)
    }

    #[inline]
    fn update(
        &mut self,
        detections: &[(BBox<Ltwh>, f32)],
        frame: Option<&Frame>,
    ) -> Result<Vec<BackendTrack>, Error> {
        (**self).update(detections, frame)
    }
}

pub struct ExternalAppearanceTracker<B> {
    backend: B,
}

impl<B: AppearanceBackend> ExternalAppearanceTracker<B> {
    pub fn new(backend: Option<B>, config: &MonitoringConfig) -> Result<Self, Error> {
        let mut backend = backend
            .ok_or_else(|| Error::BackendUnavailable("no appearance backend supplied".into()))?;

        backend
            .configure(config.max_age, config.n_init)
            .map_err(|err| Error::BackendUnavailable(err.to_string()))?;

        Ok(Self { backend })
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: AppearanceBackend> Tracking for ExternalAppearanceTracker<B> {
    fn update(&mut self, detections: &[Detection], frame: Option<&Frame>) -> Vec<Track> {
        let formatted: Vec<_> = detections
            .iter()
            .filter(|d| d.width() > 0.0 && d.height() > 0.0)
            .map(|d| (d.bbox().as_ltwh(), d.confidence))
            .collect();

        let tracks = match self.backend.update(&formatted, frame) {
            Ok(tracks) => tracks,
            Err(err) => {
                error!("Appearance tracking error: {}", err);

                return Vec::new();
            }
        };

        tracks
            .into_iter()
            .filter(|t| t.confirmed)
            .map(|t| {
                let bbox = t.bbox.to_pixels();
                let cx = (bbox[0] + bbox[2]) as f64 / 2.0;
                let cy = (bbox[1] + bbox[3]) as f64 / 2.0;

                Track::new(t.track_id, bbox, (cx, cy), 1.0)
            })
            .collect()
    }
}

/// Picks the appearance tracker when it is enabled and can be built, the
/// centroid tracker otherwise.
pub fn build_tracker(
    config: &MonitoringConfig,
    geometry: Option<&GeometryProcessor>,
    backend: Option<Box<dyn AppearanceBackend>>,
) -> Result<Box<dyn Tracking>, Error> {
    if config.use_appearance_tracker {
        match ExternalAppearanceTracker::new(backend, config) {
            Ok(tracker) => {
                info!("Using appearance tracker");

                return Ok(Box::new(tracker));
            }
            Err(err) => warn!("{}, falling back to centroid tracker", err),
        }
    }

    let tracker = CentroidTracker::from_config(config, geometry)?;
    info!(
        "Using centroid tracker ({:?} space)",
        tracker.match_space()
    );

    Ok(Box::new(tracker))
}
