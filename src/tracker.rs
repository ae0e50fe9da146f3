use std::collections::BTreeMap;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assignment::{self, AssignmentStrategy};
use crate::config::MonitoringConfig;
use crate::error::Error;
use crate::geometry::GeometryProcessor;
use crate::{Detection, Frame, Track, Tracking};

/// Space in which track positions are kept and distances are measured.
///
/// `Image` keeps the detection's pixel centroid in `Track::world_position` and
/// compares it against pixel centroids of new detections. This is the
/// historical behaviour; the threshold is then in pixels. With a camera looking
/// roughly straight down the two spaces differ only by scale, so it is kept as
/// the default rather than silently switched to `Ground`.
///
/// `Ground` projects detection centroids through the homography and compares in
/// meters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchSpace {
    #[default]
    Image,
    Ground,
}

pub struct CentroidTracker {
    // keyed by id, so iteration follows creation order
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
    max_age: u32,
    distance_threshold: f64,
    strategy: AssignmentStrategy,
    geometry: Option<GeometryProcessor>,
}

impl CentroidTracker {
    pub fn new(max_age: u32, distance_threshold: f64) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
            max_age,
            distance_threshold,
            strategy: AssignmentStrategy::Greedy,
            geometry: None,
        }
    }

    pub fn with_strategy(mut self, strategy: AssignmentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Switches matching to ground plane meters.
    pub fn with_ground_plane(mut self, geometry: GeometryProcessor) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn from_config(
        config: &MonitoringConfig,
        geometry: Option<&GeometryProcessor>,
    ) -> Result<Self, Error> {
        let tracker = Self::new(config.max_age, config.centroid_distance_threshold)
            .with_strategy(config.assignment);

        match (config.match_space, geometry) {
            (MatchSpace::Image, _) => Ok(tracker),
            (MatchSpace::Ground, Some(g)) => Ok(tracker.with_ground_plane(*g)),
            (MatchSpace::Ground, None) => Err(Error::InvalidConfig(
                "ground match space needs a calibrated geometry".into(),
            )),
        }
    }

    #[inline]
    pub fn match_space(&self) -> MatchSpace {
        if self.geometry.is_some() {
            MatchSpace::Ground
        } else {
            MatchSpace::Image
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn position(&self, det: &Detection) -> Option<na::Point2<f64>> {
        let (cx, cy) = (det.cx() as f64, det.cy() as f64);

        match &self.geometry {
            None => Some(na::Point2::new(cx, cy)),
            Some(g) => g.image_to_world_point(cx, cy),
        }
    }

    fn spawn(&mut self, det: &Detection, pos: na::Point2<f64>) {
        let id = self.next_id;
        self.next_id += 1;

        let track = Track::new(
            id,
            det.bbox().to_pixels(),
            (pos.x, pos.y),
            det.confidence,
        );

        self.tracks.insert(id, track);
    }

    fn age_tracks(&mut self) {
        for t in self.tracks.values_mut() {
            t.age += 1;
        }
    }

    fn remove_old_tracks(&mut self) {
        let max_age = self.max_age;

        self.tracks.retain(|_, t| t.age <= max_age);
    }
}

impl Tracking for CentroidTracker {
    fn update(&mut self, detections: &[Detection], _frame: Option<&Frame>) -> Vec<Track> {
        let mut candidates = Vec::with_capacity(detections.len());
        for det in detections {
            match self.position(det) {
                Some(pos) => candidates.push((det, pos)),
                None => warn!("Dropping detection {:?}, centroid not projectable", det),
            }
        }

        if candidates.is_empty() {
            self.age_tracks();
        } else if self.tracks.is_empty() {
            for (det, pos) in candidates {
                self.spawn(det, pos);
            }
        } else {
            let ids: Vec<u64> = self.tracks.keys().copied().collect();
            let track_pos: Vec<_> = self
                .tracks
                .values()
                .map(|t| na::Point2::new(t.world_position.0, t.world_position.1))
                .collect();
            let det_pos: Vec<_> = candidates.iter().map(|(_, p)| *p).collect();

            let assignment =
                assignment::assign(self.strategy, &track_pos, &det_pos, self.distance_threshold);

            for t in self.tracks.values_mut() {
                t.age += 1;
            }

            for &(ti, di, _) in &assignment.matched {
                let (det, pos) = candidates[di];

                if let Some(t) = self.tracks.get_mut(&ids[ti]) {
                    t.bbox = det.bbox().to_pixels();
                    t.world_position = (pos.x, pos.y);
                    t.confidence = det.confidence;
                    t.age = 0;
                }
            }

            for &di in &assignment.missed {
                let (det, pos) = candidates[di];
                self.spawn(det, pos);
            }
        }

        self.remove_old_tracks();

        debug!(
            "{} detections -> {} live tracks",
            detections.len(),
            self.tracks.len()
        );

        self.tracks.values().cloned().collect()
    }
}
