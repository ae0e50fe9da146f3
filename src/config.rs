use serde_derive::{Deserialize, Serialize};

use crate::assignment::AssignmentStrategy;
use crate::error::Error;
use crate::tracker::MatchSpace;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    // grid, in meters
    pub cell_width: f64,
    pub cell_height: f64,
    pub person_radius: f64,
    /// Replaces the capacity derived from `person_radius` when set.
    pub cell_capacity: Option<u32>,

    // detection
    pub detect_every: u32,
    pub confidence_threshold: f32,
    pub min_bbox_area: f32,

    // tracking
    pub use_appearance_tracker: bool,
    pub max_age: u32,
    pub n_init: u32,
    pub centroid_distance_threshold: f64,
    pub match_space: MatchSpace,
    pub assignment: AssignmentStrategy,

    // smoothing and alerts
    pub ema_alpha: f64,
    pub hysteresis_time: f64,
    pub alert_clear_offset: f64,
    pub occupancy_warning_threshold: f64,

    // grid size toggling
    pub grid_toggle_multipliers: Vec<f64>,
    pub grid_toggle_cell_thresholds: Vec<usize>,

    pub fps_counter_window: usize,

    // preset calibration area, in meters
    pub calibration_area_width: f64,
    pub calibration_area_height: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cell_width: 1.0,
            cell_height: 1.0,
            person_radius: 2.0,
            cell_capacity: None,
            detect_every: 5,
            confidence_threshold: 0.35,
            min_bbox_area: 1500.0,
            use_appearance_tracker: false,
            max_age: 80,
            n_init: 1,
            centroid_distance_threshold: 80.0,
            match_space: MatchSpace::Image,
            assignment: AssignmentStrategy::Greedy,
            ema_alpha: 0.4,
            hysteresis_time: 3.0,
            alert_clear_offset: 0.5,
            occupancy_warning_threshold: 0.8,
            grid_toggle_multipliers: vec![1.0, 0.67, 0.5],
            grid_toggle_cell_thresholds: vec![24, 48],
            fps_counter_window: 30,
            calibration_area_width: 10.0,
            calibration_area_height: 10.0,
        }
    }
}

fn positive(name: &str, v: f64) -> Result<(), Error> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{} must be > 0, got {}", name, v)))
    }
}

fn non_negative(name: &str, v: f64) -> Result<(), Error> {
    if v >= 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{} must be >= 0, got {}", name, v)))
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<(), Error> {
        positive("cell_width", self.cell_width)?;
        positive("cell_height", self.cell_height)?;

        if self.cell_capacity.is_none() {
            positive("person_radius", self.person_radius)?;
        }

        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "ema_alpha must be in (0, 1], got {}",
                self.ema_alpha
            )));
        }

        non_negative("hysteresis_time", self.hysteresis_time)?;
        non_negative("alert_clear_offset", self.alert_clear_offset)?;
        positive(
            "centroid_distance_threshold",
            self.centroid_distance_threshold,
        )?;

        if self.detect_every == 0 {
            return Err(Error::InvalidConfig("detect_every must be >= 1".into()));
        }

        if self.grid_toggle_multipliers.iter().any(|&m| !(m > 0.0)) {
            return Err(Error::InvalidConfig(
                "grid_toggle_multipliers must be > 0".into(),
            ));
        }

        Ok(())
    }
}
