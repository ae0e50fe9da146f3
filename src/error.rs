use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Calibration requires 4 points, got {0}")]
    NotEnoughPoints(usize),

    #[error("World dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },

    #[error("Calibration points are degenerate")]
    DegeneratePoints,

    #[error("Homography is not invertible")]
    SingularHomography,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tracker backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Detector Error: {0}")]
    Detector(String),
}
