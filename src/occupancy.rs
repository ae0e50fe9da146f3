//! Occupancy grid over the calibrated ground plane.
//!
//! Every update projects the tracked bboxes to the ground, spreads each
//! footprint over the cells it overlaps, smooths the per cell counts with an
//! EMA and advances the per cell overcapacity timers. A cell raises an alert
//! once its timer reaches `hysteresis_time` and clears it when the smoothed
//! count falls to `capacity - alert_clear_offset`.

use std::f64::consts::PI;
use std::ops::RangeInclusive;

use chrono::Utc;
use geo::{coord, Area, BooleanOps, Rect};
use ndarray::{Array2, Zip};
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alert::AlertEvent;
use crate::config::MonitoringConfig;
use crate::error::Error;
use crate::geometry::GeometryProcessor;
use crate::Track;

// footprints smaller than this (m^2) are ignored
const MIN_POLYGON_AREA: f64 = 1e-6;

// added to a cell when its overlap cannot be computed
const INTERSECTION_FALLBACK: f64 = 0.1;

/// People per cell: `floor(cell area / person disc area)`, or the override.
/// Never less than one.
pub fn cell_capacity(
    cell_width: f64,
    cell_height: f64,
    person_radius: f64,
    capacity_override: Option<u32>,
) -> u32 {
    let cap = match capacity_override {
        Some(cap) => cap,
        None => {
            let person_area = PI * person_radius * person_radius;

            // saturating, NaN becomes 0
            ((cell_width * cell_height) / person_area) as u32
        }
    };

    cap.max(1)
}

// Fraction of a footprint of `area` that falls into one cell.
fn overlap_share(overlap: f64, area: f64) -> f64 {
    let share = overlap / area;

    if share.is_finite() {
        share.clamp(0.0, 1.0)
    } else {
        INTERSECTION_FALLBACK
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyLevel {
    Normal,
    Warning,
    Critical,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CellState {
    pub row: usize,
    pub col: usize,
    pub count: f64,
    pub timer: f64,
    pub notified: bool,
    pub level: OccupancyLevel,
}

#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    config: MonitoringConfig,
    geometry: GeometryProcessor,
    world_width: f64,
    world_height: f64,
    rows: usize,
    cols: usize,
    capacity: u32,
    ema_counts: Array2<f64>,
    timers: Array2<f64>,
    notified: Array2<bool>,
}

fn check_world(world_width: f64, world_height: f64) -> Result<(), Error> {
    if world_width > 0.0 && world_height > 0.0 && world_width.is_finite() && world_height.is_finite()
    {
        Ok(())
    } else {
        Err(Error::InvalidDimensions {
            width: world_width,
            height: world_height,
        })
    }
}

impl OccupancyGrid {
    pub fn new(
        config: &MonitoringConfig,
        geometry: GeometryProcessor,
        world_width: f64,
        world_height: f64,
    ) -> Result<Self, Error> {
        config.validate()?;
        check_world(world_width, world_height)?;

        let mut grid = Self {
            config: config.clone(),
            geometry,
            world_width,
            world_height,
            rows: 0,
            cols: 0,
            capacity: 1,
            ema_counts: Array2::zeros((0, 0)),
            timers: Array2::zeros((0, 0)),
            notified: Array2::from_elem((0, 0), false),
        };
        grid.layout();

        info!(
            "Grid initialized: {}x{} cells, capacity: {} per cell",
            grid.rows, grid.cols, grid.capacity
        );

        Ok(grid)
    }

    // Recomputes dimensions and capacity and drops all accumulated state.
    fn layout(&mut self) {
        let (cw, ch) = (self.config.cell_width, self.config.cell_height);

        self.cols = ((self.world_width / cw).ceil() as usize).max(1);
        self.rows = ((self.world_height / ch).ceil() as usize).max(1);
        self.capacity = cell_capacity(cw, ch, self.config.person_radius, self.config.cell_capacity);

        self.ema_counts = Array2::zeros((self.rows, self.cols));
        self.timers = Array2::zeros((self.rows, self.cols));
        self.notified = Array2::from_elem((self.rows, self.cols), false);
    }

    /// Rebuilds the grid for a new world size. All counts, timers and active
    /// alerts are discarded.
    pub fn reinitialize(&mut self, world_width: f64, world_height: f64) -> Result<(), Error> {
        check_world(world_width, world_height)?;

        self.world_width = world_width;
        self.world_height = world_height;
        self.layout();

        info!("Grid reinitialized: {}x{} cells", self.rows, self.cols);

        Ok(())
    }

    /// Changes the cell size, which rebuilds the grid from scratch.
    pub fn set_cell_size(&mut self, cell_width: f64, cell_height: f64) -> Result<(), Error> {
        let mut config = self.config.clone();
        config.cell_width = cell_width;
        config.cell_height = cell_height;
        config.validate()?;

        self.config = config;
        self.reinitialize(self.world_width, self.world_height)
    }

    /// Accumulates the footprints of `tracks`, applies the EMA and advances
    /// the alert timers by `dt` seconds. Returns the alert transitions of this
    /// update.
    ///
    /// The EMA is applied once per call and is not scaled by `dt`.
    pub fn update(&mut self, tracks: &[Track], dt: f64) -> Vec<AlertEvent> {
        let mut current = Array2::<f64>::zeros((self.rows, self.cols));

        for track in tracks {
            self.accumulate(track, &mut current);
        }

        let alpha = self.config.ema_alpha;
        Zip::from(&mut self.ema_counts)
            .and(&current)
            .for_each(|ema, &cur| *ema = alpha * cur + (1.0 - alpha) * *ema);

        debug!(
            "Grid update: {} tracks, total occupancy {:.2}",
            tracks.len(),
            self.total_occupancy()
        );

        self.update_alerts(dt)
    }

    fn accumulate(&self, track: &Track, current: &mut Array2<f64>) {
        let poly = match self.geometry.project_bbox_to_world(track.bbox) {
            Some(poly) => poly,
            None => return,
        };

        let area = poly.area();
        if !(area > MIN_POLYGON_AREA) {
            return;
        }

        let (rows, cols) = match poly.bounds().and_then(|b| self.cell_range(&b)) {
            Some(range) => range,
            None => return,
        };

        for row in rows {
            for col in cols.clone() {
                let cell = self.cell_rect(row, col).to_polygon();
                let overlap = poly.polygon.intersection(&cell).unsigned_area();

                current[[row, col]] += overlap_share(overlap, area);
            }
        }
    }

    fn cell_rect(&self, row: usize, col: usize) -> Rect<f64> {
        let (cw, ch) = (self.config.cell_width, self.config.cell_height);

        Rect::new(
            coord! { x: col as f64 * cw, y: row as f64 * ch },
            coord! { x: (col + 1) as f64 * cw, y: (row + 1) as f64 * ch },
        )
    }

    // Cells touched by a world bounding box, clamped to the grid.
    fn cell_range(
        &self,
        bounds: &Rect<f64>,
    ) -> Option<(RangeInclusive<usize>, RangeInclusive<usize>)> {
        let (cw, ch) = (self.config.cell_width, self.config.cell_height);

        let min_col = (bounds.min().x / cw).floor().max(0.0);
        let max_col = (bounds.max().x / cw).floor().min(self.cols as f64 - 1.0);
        let min_row = (bounds.min().y / ch).floor().max(0.0);
        let max_row = (bounds.max().y / ch).floor().min(self.rows as f64 - 1.0);

        if !(min_col <= max_col && min_row <= max_row) {
            return None;
        }

        Some((
            min_row as usize..=max_row as usize,
            min_col as usize..=max_col as usize,
        ))
    }

    fn update_alerts(&mut self, dt: f64) -> Vec<AlertEvent> {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let capacity = self.capacity;
        let over = capacity as f64;
        let clear_level = (over - self.config.alert_clear_offset).max(0.0);
        let hysteresis = self.config.hysteresis_time;

        let mut events = Vec::new();

        Zip::indexed(&self.ema_counts)
            .and(&mut self.timers)
            .and(&mut self.notified)
            .for_each(|(row, col), &count, timer, notified| {
                if count > over {
                    *timer += dt;
                } else {
                    *timer = (*timer - dt).max(0.0);
                }

                // a cell with no accumulated time never activates
                if !*notified && *timer >= hysteresis && *timer > 0.0 {
                    let timestamp = Utc::now();

                    warn!(
                        "OVERCAPACITY ALERT - Cell ({},{}) occupancy: {:.2}/{} at {}",
                        row,
                        col,
                        count,
                        capacity,
                        timestamp.format("%Y-%m-%d %H:%M:%S")
                    );

                    *notified = true;
                    events.push(AlertEvent::Activated {
                        row,
                        col,
                        count,
                        capacity,
                        timestamp,
                    });
                }

                if *notified && count <= clear_level {
                    info!("Alert cleared for cell ({},{})", row, col);

                    *notified = false;
                    events.push(AlertEvent::Cleared { row, col });
                }
            });

        events
    }

    /// Grid cell under the ground centroid of the track's footprint.
    pub fn get_cell_for_track(&self, track: &Track) -> Option<(usize, usize)> {
        let c = self.geometry.project_bbox_to_world(track.bbox)?.centroid()?;

        let col = (c.x / self.config.cell_width).floor();
        let row = (c.y / self.config.cell_height).floor();

        if row >= 0.0 && col >= 0.0 && row < self.rows as f64 && col < self.cols as f64 {
            Some((row as usize, col as usize))
        } else {
            None
        }
    }

    pub fn level(&self, count: f64) -> OccupancyLevel {
        let capacity = self.capacity as f64;

        if count > capacity {
            OccupancyLevel::Critical
        } else if count > capacity * self.config.occupancy_warning_threshold {
            OccupancyLevel::Warning
        } else {
            OccupancyLevel::Normal
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<CellState> {
        let count = *self.ema_counts.get((row, col))?;

        Some(CellState {
            row,
            col,
            count,
            timer: self.timers[[row, col]],
            notified: self.notified[[row, col]],
            level: self.level(count),
        })
    }

    pub fn cells(&self) -> impl Iterator<Item = CellState> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).filter_map(move |col| self.cell(row, col)))
    }

    pub fn active_alerts(&self) -> Vec<(usize, usize)> {
        self.notified
            .indexed_iter()
            .filter(|(_, n)| **n)
            .map(|(idx, _)| idx)
            .collect()
    }

    #[inline]
    pub fn total_occupancy(&self) -> f64 {
        self.ema_counts.sum()
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn cell_capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn cell_size(&self) -> (f64, f64) {
        (self.config.cell_width, self.config.cell_height)
    }

    #[inline]
    pub fn world_size(&self) -> (f64, f64) {
        (self.world_width, self.world_height)
    }

    #[inline]
    pub fn ema_counts(&self) -> &Array2<f64> {
        &self.ema_counts
    }

    #[inline]
    pub fn timers(&self) -> &Array2<f64> {
        &self.timers
    }

    #[inline]
    pub fn notified(&self) -> &Array2<bool> {
        &self.notified
    }

    #[inline]
    pub fn geometry(&self) -> &GeometryProcessor {
        &self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra as na;

    // 100 px per meter, camera looking straight down
    fn geometry() -> GeometryProcessor {
        let forward = na::Matrix3::new(0.01, 0.0, 0.0, 0.0, 0.01, 0.0, 0.0, 0.0, 1.0);

        GeometryProcessor::from_forward(forward).unwrap()
    }

    fn config() -> MonitoringConfig {
        MonitoringConfig {
            cell_width: 2.0,
            cell_height: 2.0,
            person_radius: 0.5,
            ema_alpha: 0.4,
            hysteresis_time: 3.0,
            alert_clear_offset: 0.5,
            ..Default::default()
        }
    }

    fn grid() -> OccupancyGrid {
        OccupancyGrid::new(&config(), geometry(), 10.0, 8.0).unwrap()
    }

    fn track(bbox: [i32; 4]) -> Track {
        Track::new(1, bbox, (0.0, 0.0), 1.0)
    }

    #[test]
    fn dimensions_and_capacity() {
        let g = grid();

        assert_eq!((g.rows(), g.cols()), (4, 5));
        assert_eq!(g.cell_capacity(), 5);
        assert_eq!(g.ema_counts().dim(), (4, 5));
    }

    #[test]
    fn partial_cells_round_up() {
        let g = OccupancyGrid::new(&config(), geometry(), 9.1, 7.9).unwrap();

        assert_eq!((g.rows(), g.cols()), (4, 5));
    }

    #[test]
    fn capacity_never_grows_with_radius() {
        let mut prev = u32::MAX;

        for i in 1..200 {
            let cap = cell_capacity(2.0, 2.0, i as f64 * 0.05, None);

            assert!(cap <= prev);
            assert!(cap >= 1);
            prev = cap;
        }
    }

    #[test]
    fn capacity_override_is_clamped() {
        assert_eq!(cell_capacity(2.0, 2.0, 0.5, Some(12)), 12);
        assert_eq!(cell_capacity(2.0, 2.0, 0.5, Some(0)), 1);
        assert_eq!(cell_capacity(1.0, 1.0, 2.0, None), 1);
    }

    #[test]
    fn full_overlap_single_update() {
        let mut g = grid();
        // (0.2, 0.2) - (1.5, 1.8) m, inside cell (0, 0)
        g.update(&[track([20, 20, 150, 180])], 0.1);

        assert_abs_diff_eq!(g.ema_counts()[[0, 0]], 0.4, epsilon = 1e-9);
        assert_abs_diff_eq!(g.total_occupancy(), 0.4, epsilon = 1e-9);
    }

    #[test]
    fn footprint_split_between_cells() {
        let mut g = OccupancyGrid::new(
            &MonitoringConfig {
                ema_alpha: 1.0,
                ..config()
            },
            geometry(),
            10.0,
            8.0,
        )
        .unwrap();

        // (1.5, 0.5) - (2.5, 1.5) m straddles the col 0 / col 1 border
        g.update(&[track([150, 50, 250, 150])], 0.1);

        assert_abs_diff_eq!(g.ema_counts()[[0, 0]], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(g.ema_counts()[[0, 1]], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(g.total_occupancy(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn footprint_outside_grid_is_clamped() {
        let mut g = OccupancyGrid::new(
            &MonitoringConfig {
                ema_alpha: 1.0,
                ..config()
            },
            geometry(),
            10.0,
            8.0,
        )
        .unwrap();

        // half of it hangs off the left edge
        g.update(&[track([-50, 50, 50, 150])], 0.1);
        assert_abs_diff_eq!(g.ema_counts()[[0, 0]], 0.5, epsilon = 1e-9);

        // entirely outside
        g.update(&[track([2000, 2000, 2100, 2100])], 0.1);
        assert_abs_diff_eq!(g.total_occupancy(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_footprint_is_skipped() {
        let mut g = grid();
        g.update(&[track([100, 100, 100, 200])], 0.1);

        assert_eq!(g.total_occupancy(), 0.0);
    }

    #[test]
    fn unprojectable_footprint_is_skipped() {
        // w vanishes on x = 200 px
        let forward = na::Matrix3::new(0.01, 0.0, 0.0, 0.0, 0.01, 0.0, -0.005, 0.0, 1.0);
        let geometry = GeometryProcessor::from_forward(forward).unwrap();
        let mut g = OccupancyGrid::new(&config(), geometry, 10.0, 8.0).unwrap();

        g.update(&[track([100, 0, 200, 50])], 0.1);

        assert_eq!(g.total_occupancy(), 0.0);
    }

    #[test]
    fn ema_converges_monotonically() {
        let mut g = grid();
        let alpha: f64 = 0.4;
        let ticks = ((0.01f64).ln() / (1.0 - alpha).ln()).ceil() as usize;

        let mut prev = 0.0;
        for _ in 0..ticks {
            g.update(&[track([20, 20, 150, 180])], 0.1);

            let v = g.ema_counts()[[0, 0]];
            assert!(v > prev);
            assert!(v <= 1.0 + 1e-9);
            prev = v;
        }

        assert!((1.0 - prev).abs() <= 0.01);
    }

    #[test]
    fn activation_on_third_second() {
        let mut g = grid();
        g.ema_counts[[0, 0]] = 6.0;

        assert!(g.update_alerts(1.0).is_empty());
        assert!(g.update_alerts(1.0).is_empty());

        let events = g.update_alerts(1.0);
        assert_eq!(events.len(), 1);
        match events[0] {
            AlertEvent::Activated {
                row,
                col,
                count,
                capacity,
                ..
            } => {
                assert_eq!((row, col), (0, 0));
                assert_eq!(count, 6.0);
                assert_eq!(capacity, 5);
            }
            _ => panic!("expected activation"),
        }

        // stays active without repeating
        assert!(g.update_alerts(1.0).is_empty());
        assert_eq!(g.active_alerts(), vec![(0, 0)]);
    }

    #[test]
    fn hysteresis_boundary() {
        let eps = 1e-3;
        let mut g = grid();
        g.ema_counts[[1, 2]] = 6.0;

        assert!(g.update_alerts(3.0 - eps).is_empty());
        assert!(!g.notified()[[1, 2]]);

        let events = g.update_alerts(2.0 * eps);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cell(), (1, 2));
        assert!(events[0].is_activation());
    }

    #[test]
    fn timer_decays_without_going_negative() {
        let mut g = grid();
        g.ema_counts[[0, 0]] = 6.0;
        g.update_alerts(2.0);

        g.ema_counts[[0, 0]] = 1.0;
        g.update_alerts(1.5);
        assert_abs_diff_eq!(g.timers()[[0, 0]], 0.5, epsilon = 1e-12);

        g.update_alerts(1.5);
        assert_eq!(g.timers()[[0, 0]], 0.0);
    }

    #[test]
    fn clearing_requires_margin() {
        let mut g = grid();
        g.ema_counts[[0, 0]] = 6.0;
        g.update_alerts(3.0);
        assert!(g.notified()[[0, 0]]);

        g.ema_counts[[0, 0]] = 5.0;
        assert!(g.update_alerts(1.0).is_empty());
        assert!(g.notified()[[0, 0]]);

        g.ema_counts[[0, 0]] = 4.6;
        assert!(g.update_alerts(1.0).is_empty());

        g.ema_counts[[0, 0]] = 4.5;
        let events = g.update_alerts(1.0);
        assert_eq!(events, vec![AlertEvent::Cleared { row: 0, col: 0 }]);
        assert!(g.active_alerts().is_empty());
    }

    #[test]
    fn cells_are_independent() {
        let mut g = grid();
        g.ema_counts[[0, 0]] = 6.0;
        g.update_alerts(2.0);
        g.ema_counts[[3, 4]] = 7.0;

        let events = g.update_alerts(1.0);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cell(), (0, 0));
        assert_eq!(g.timers()[[3, 4]], 1.0);
    }

    #[test]
    fn zero_hysteresis_ignores_idle_cells() {
        let mut g = OccupancyGrid::new(
            &MonitoringConfig {
                hysteresis_time: 0.0,
                ..config()
            },
            geometry(),
            10.0,
            8.0,
        )
        .unwrap();

        assert!(g.update_alerts(1.0).is_empty());

        g.ema_counts[[0, 0]] = 6.0;
        assert_eq!(g.update_alerts(0.1).len(), 1);
    }

    #[test]
    fn reinitialize_discards_state() {
        let mut g = grid();
        g.update(&[track([20, 20, 150, 180])], 0.1);
        g.ema_counts[[0, 0]] = 6.0;
        g.update_alerts(3.0);

        g.reinitialize(6.0, 6.0).unwrap();

        assert_eq!((g.rows(), g.cols()), (3, 3));
        assert_eq!(g.total_occupancy(), 0.0);
        assert!(g.timers().iter().all(|&t| t == 0.0));
        assert!(g.active_alerts().is_empty());

        assert!(g.reinitialize(0.0, 6.0).is_err());
    }

    #[test]
    fn cell_size_change_rebuilds() {
        let mut g = grid();
        g.update(&[track([20, 20, 150, 180])], 0.1);

        g.set_cell_size(1.0, 1.0).unwrap();

        assert_eq!((g.rows(), g.cols()), (8, 10));
        assert_eq!(g.cell_capacity(), 1);
        assert_eq!(g.total_occupancy(), 0.0);
        assert!(g.set_cell_size(0.0, 1.0).is_err());
        assert_eq!(g.cell_size(), (1.0, 1.0));
    }

    #[test]
    fn cell_for_track() {
        let g = grid();

        // centroid (3.0, 5.0) m
        assert_eq!(g.get_cell_for_track(&track([250, 450, 350, 550])), Some((2, 1)));
        assert_eq!(g.get_cell_for_track(&track([-300, 50, -100, 150])), None);
        assert_eq!(g.get_cell_for_track(&track([50, 850, 150, 950])), None);
    }

    #[test]
    fn failed_overlap_uses_fallback() {
        assert_eq!(overlap_share(f64::NAN, 2.0), INTERSECTION_FALLBACK);
        assert_eq!(overlap_share(f64::INFINITY, 2.0), INTERSECTION_FALLBACK);
        assert_eq!(overlap_share(1.0, 0.0), INTERSECTION_FALLBACK);

        assert_eq!(overlap_share(1.0, 2.0), 0.5);
        assert_eq!(overlap_share(3.0, 2.0), 1.0);
        assert_eq!(overlap_share(-1e-12, 2.0), 0.0);
    }

    #[test]
    fn occupancy_levels() {
        let g = grid();

        assert_eq!(g.level(3.9), OccupancyLevel::Normal);
        assert_eq!(g.level(4.5), OccupancyLevel::Warning);
        assert_eq!(g.level(5.0), OccupancyLevel::Warning);
        assert_eq!(g.level(5.1), OccupancyLevel::Critical);

        assert_eq!(g.cells().count(), 20);
        assert_eq!(g.cell(4, 0), None);
    }
}
