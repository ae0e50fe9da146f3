use nalgebra as na;
use tracing::info;

use crate::config::MonitoringConfig;
use crate::error::Error;
use crate::geometry::GeometryProcessor;
use crate::math;

// doubled triangle area in px^2 below which three points count as one line
const COLLINEAR_EPSILON: f64 = 1e-6;

/// Result of a ground plane calibration: the homography pair plus the size of
/// the calibrated rectangle in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    geometry: GeometryProcessor,
    world_width: f64,
    world_height: f64,
}

impl Calibration {
    /// `points` are image pixels matching the world corners `(0,0)`, `(W,0)`,
    /// `(W,H)`, `(0,H)` in that order. Only the first four are used.
    pub fn from_points(
        points: &[na::Point2<f64>],
        world_width: f64,
        world_height: f64,
    ) -> Result<Self, Error> {
        if points.len() < 4 {
            return Err(Error::NotEnoughPoints(points.len()));
        }

        if !(world_width > 0.0 && world_height > 0.0)
            || !world_width.is_finite()
            || !world_height.is_finite()
        {
            return Err(Error::InvalidDimensions {
                width: world_width,
                height: world_height,
            });
        }

        let img = [points[0], points[1], points[2], points[3]];

        if img.iter().any(|p| !p.x.is_finite() || !p.y.is_finite())
            || math::has_collinear_triple(&img, COLLINEAR_EPSILON)
        {
            return Err(Error::DegeneratePoints);
        }

        let world = [
            na::Point2::new(0.0, 0.0),
            na::Point2::new(world_width, 0.0),
            na::Point2::new(world_width, world_height),
            na::Point2::new(0.0, world_height),
        ];

        let forward = math::perspective_transform(&img, &world).ok_or(Error::DegeneratePoints)?;
        let geometry = GeometryProcessor::from_forward(forward).ok_or(Error::SingularHomography)?;

        info!(
            "Calibration completed: {}x{}m",
            world_width, world_height
        );

        Ok(Self {
            geometry,
            world_width,
            world_height,
        })
    }

    /// Calibrates against the preset area size from the config instead of
    /// asking for dimensions.
    pub fn from_preset(points: &[na::Point2<f64>], config: &MonitoringConfig) -> Result<Self, Error> {
        info!(
            "Using preset calibration dimensions: {}m x {}m",
            config.calibration_area_width, config.calibration_area_height
        );

        Self::from_points(
            points,
            config.calibration_area_width,
            config.calibration_area_height,
        )
    }

    #[inline]
    pub fn geometry(&self) -> &GeometryProcessor {
        &self.geometry
    }

    #[inline]
    pub fn world_width(&self) -> f64 {
        self.world_width
    }

    #[inline]
    pub fn world_height(&self) -> f64 {
        self.world_height
    }
}
