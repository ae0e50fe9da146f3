//! Per frame pipeline: detector -> tracker -> occupancy grid -> alert sinks.

use tracing::{debug, error, info};

use crate::alert::{AlertEvent, AlertSink};
use crate::appearance::{self, AppearanceBackend};
use crate::calibration::Calibration;
use crate::config::MonitoringConfig;
use crate::detector::{DetectionFilter, Detector};
use crate::error::Error;
use crate::occupancy::OccupancyGrid;
use crate::rolling_avg::RollingAvg;
use crate::{Frame, Track, Tracking};

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub tracks: Vec<Track>,
    pub events: Vec<AlertEvent>,
    /// Whether the detector ran on this frame.
    pub detected: bool,
}

pub struct Monitor<D> {
    config: MonitoringConfig,
    detector: D,
    filter: DetectionFilter,
    tracker: Box<dyn Tracking>,
    calibration: Calibration,
    grid: OccupancyGrid,
    fps: RollingAvg,
    sinks: Vec<Box<dyn AlertSink>>,
    frame_count: u64,
    last_timestamp: Option<f64>,
    monitoring: bool,
    base_cell_size: (f64, f64),
}

impl<D: Detector> Monitor<D> {
    pub fn new(
        config: MonitoringConfig,
        detector: D,
        calibration: Calibration,
        backend: Option<Box<dyn AppearanceBackend>>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let tracker = appearance::build_tracker(&config, Some(calibration.geometry()), backend)?;
        let grid = OccupancyGrid::new(
            &config,
            *calibration.geometry(),
            calibration.world_width(),
            calibration.world_height(),
        )?;

        Ok(Self {
            filter: DetectionFilter::from_config(&config),
            fps: RollingAvg::new(config.fps_counter_window),
            base_cell_size: (config.cell_width, config.cell_height),
            config,
            detector,
            tracker,
            calibration,
            grid,
            sinks: Vec::new(),
            frame_count: 0,
            last_timestamp: None,
            monitoring: true,
        })
    }

    pub fn add_sink<S: AlertSink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    /// Grid updates and alerts are skipped while monitoring is off; detection
    /// and tracking keep running.
    pub fn set_monitoring(&mut self, enabled: bool) {
        if self.monitoring != enabled {
            info!("Monitoring {}", if enabled { "enabled" } else { "disabled" });
        }

        self.monitoring = enabled;
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        self.frame_count += 1;

        // NaN and backwards jumps count as no time passed
        let dt = match self.last_timestamp {
            Some(prev) => (frame.timestamp - prev).max(0.0),
            None => 0.0,
        };
        self.last_timestamp = Some(frame.timestamp);
        self.fps.push(frame.timestamp);

        let detected = self.frame_count % u64::from(self.config.detect_every) == 0;
        let detections = if detected {
            match self.detector.detect(frame) {
                Ok(dets) => self.filter.apply(&dets, frame.dims),
                Err(err) => {
                    error!("Detection error: {}", err);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let tracks = self.tracker.update(&detections, Some(frame));

        let events = if self.monitoring {
            self.grid.update(&tracks, dt)
        } else {
            Vec::new()
        };

        for event in &events {
            for sink in self.sinks.iter_mut() {
                sink.on_event(event);
            }
        }

        debug!(
            "Frame {}: {} detections, {} tracks, {} events",
            self.frame_count,
            detections.len(),
            tracks.len(),
            events.len()
        );

        FrameReport {
            tracks,
            events,
            detected,
        }
    }

    /// Shrinks the cells by the next multiplier, picked from the current cell
    /// count. Scaling is always relative to the initial cell size.
    pub fn toggle_grid_size(&mut self) -> Result<(), Error> {
        let cells = self.grid.rows() * self.grid.cols();

        let mut idx = if self
            .config
            .grid_toggle_cell_thresholds
            .iter()
            .any(|&t| cells <= t)
        {
            1
        } else {
            0
        };

        if idx >= self.config.grid_toggle_multipliers.len() {
            idx = 0;
        }

        let multiplier = self
            .config
            .grid_toggle_multipliers
            .get(idx)
            .copied()
            .unwrap_or(1.0);

        let (w, h) = self.base_cell_size;
        self.grid.set_cell_size(w * multiplier, h * multiplier)?;

        info!(
            "Grid size toggled: {:.2}x{:.2}m cells ({}x{})",
            w * multiplier,
            h * multiplier,
            self.grid.rows(),
            self.grid.cols()
        );

        Ok(())
    }

    pub fn reset_grid_size(&mut self) -> Result<(), Error> {
        let (w, h) = self.base_cell_size;
        self.grid.set_cell_size(w, h)?;

        info!("Grid reset to initial size");

        Ok(())
    }

    /// Frames per second over the last `fps_counter_window` frames.
    #[inline]
    pub fn fps(&self) -> Option<f64> {
        self.fps.rate()
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    #[inline]
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[inline]
    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    #[inline]
    pub fn detector(&self) -> &D {
        &self.detector
    }
}
