//! Image pixels <-> ground plane meters through a homography pair.

use geo::{Area, BoundingRect, Centroid, LineString, Polygon, Rect};
use nalgebra as na;
use num_traits::ToPrimitive;
use tracing::warn;

use crate::math;

/// Ground plane quadrilateral of a projected image bbox.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldPolygon {
    pub polygon: Polygon<f64>,

    // top-left, top-right, bottom-right, bottom-left of the source bbox
    pub corners: [na::Point2<f64>; 4],
}

impl WorldPolygon {
    pub fn from_corners(corners: [na::Point2<f64>; 4]) -> Self {
        let ring: Vec<(f64, f64)> = corners.iter().map(|p| (p.x, p.y)).collect();

        Self {
            polygon: Polygon::new(LineString::from(ring), vec![]),
            corners,
        }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    #[inline]
    pub fn centroid(&self) -> Option<na::Point2<f64>> {
        self.polygon
            .centroid()
            .map(|c| na::Point2::new(c.x(), c.y()))
    }

    #[inline]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.polygon.bounding_rect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryProcessor {
    forward: na::Matrix3<f64>,
    inverse: na::Matrix3<f64>,
}

impl GeometryProcessor {
    /// `forward` maps image to world, `inverse` maps world back to image.
    pub fn new(forward: na::Matrix3<f64>, inverse: na::Matrix3<f64>) -> Self {
        Self { forward, inverse }
    }

    /// Builds the pair from the image to world matrix alone.
    pub fn from_forward(forward: na::Matrix3<f64>) -> Option<Self> {
        let inverse = math::inverse_homography(&forward)?;

        Some(Self::new(forward, inverse))
    }

    #[inline]
    pub fn forward(&self) -> &na::Matrix3<f64> {
        &self.forward
    }

    #[inline]
    pub fn inverse(&self) -> &na::Matrix3<f64> {
        &self.inverse
    }

    pub fn project_bbox_to_world(&self, bbox: [i32; 4]) -> Option<WorldPolygon> {
        let [x1, y1, x2, y2] = bbox.map(f64::from);
        let corners = [(x1, y1), (x2, y1), (x2, y2), (x1, y2)];

        let mut world = [na::Point2::origin(); 4];
        for (dst, &(x, y)) in world.iter_mut().zip(corners.iter()) {
            match math::transform_point(&self.forward, na::Point2::new(x, y)) {
                Some(p) => *dst = p,
                None => {
                    warn!("Failed to project bbox {:?} to world", bbox);
                    return None;
                }
            }
        }

        Some(WorldPolygon::from_corners(world))
    }

    #[inline]
    pub fn image_to_world_point(&self, x: f64, y: f64) -> Option<na::Point2<f64>> {
        math::transform_point(&self.forward, na::Point2::new(x, y))
    }

    /// Pixel coordinates are truncated. Returns `(0, 0)` when the point cannot
    /// be mapped, which is only good enough for drawing.
    pub fn world_to_image_point(&self, x: f64, y: f64) -> (i32, i32) {
        let px = math::transform_point(&self.inverse, na::Point2::new(x, y))
            .and_then(|p| Some((p.x.to_i32()?, p.y.to_i32()?)));

        match px {
            Some(px) => px,
            None => {
                warn!("Failed to convert world point ({}, {}) to image", x, y);
                (0, 0)
            }
        }
    }
}
