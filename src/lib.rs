pub mod alert;
pub mod appearance;
pub mod assignment;
pub mod bbox;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod math;
pub mod monitor;
pub mod occupancy;
pub mod rolling_avg;
pub mod tracker;

mod circular_queue;
mod track;

pub use alert::{AlertEvent, AlertSink};
pub use appearance::{build_tracker, AppearanceBackend, BackendTrack, ExternalAppearanceTracker};
pub use assignment::AssignmentStrategy;
pub use calibration::Calibration;
pub use config::MonitoringConfig;
pub use detection::Detection;
pub use detector::{DetectionFilter, Detector};
pub use error::Error;
pub use frame::Frame;
pub use geometry::{GeometryProcessor, WorldPolygon};
pub use monitor::{FrameReport, Monitor};
pub use occupancy::{CellState, OccupancyGrid, OccupancyLevel};
pub use track::Track;
pub use tracker::{CentroidTracker, MatchSpace};

/// Turns the detections of one frame into the set of live tracks.
///
/// Called once per frame, also on frames where the detector did not run, in
/// which case `detections` is empty and tracks only age.
pub trait Tracking {
    fn update(&mut self, detections: &[Detection], frame: Option<&Frame>) -> Vec<Track>;
}
