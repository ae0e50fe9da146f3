//! Track to detection association on centroid distance.

use munkres::{solve_assignment, WeightMatrix};
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::warn;

// cost of a padded or gated pair in the Hungarian matrix
const FORBIDDEN_COST: f64 = 1.0e9;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStrategy {
    /// Each track in order takes its nearest unused detection.
    #[default]
    Greedy,
    /// Minimum total distance over all pairs (Hungarian).
    Optimal,
}

/// Matched `(track, detection, distance)` triples plus indexes of detections
/// left without a track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    pub matched: Vec<(usize, usize, f64)>,
    pub missed: Vec<usize>,
}

impl Assignment {
    fn from_matches(matched: Vec<(usize, usize, f64)>, dets_len: usize) -> Self {
        let missed = (0..dets_len)
            .filter(|x| !matched.iter().any(|&(_, d, _)| d == *x))
            .collect();

        Self { matched, missed }
    }
}

pub fn assign(
    strategy: AssignmentStrategy,
    tracks: &[na::Point2<f64>],
    dets: &[na::Point2<f64>],
    threshold: f64,
) -> Assignment {
    match strategy {
        AssignmentStrategy::Greedy => greedy(tracks, dets, threshold),
        AssignmentStrategy::Optimal => optimal(tracks, dets, threshold),
    }
}

/// Tracks are visited in slice order and detections scanned in slice order,
/// so on equal distances the earlier track and the earlier detection win.
pub fn greedy(tracks: &[na::Point2<f64>], dets: &[na::Point2<f64>], threshold: f64) -> Assignment {
    let mut used = vec![false; dets.len()];
    let mut matched = Vec::new();

    for (ti, tp) in tracks.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;

        for (di, dp) in dets.iter().enumerate() {
            if used[di] {
                continue;
            }

            let dist = na::distance(tp, dp);
            let best_dist = best.map_or(f64::INFINITY, |(_, d)| d);

            if dist < best_dist && dist < threshold {
                best = Some((di, dist));
            }
        }

        if let Some((di, dist)) = best {
            used[di] = true;
            matched.push((ti, di, dist));
        }
    }

    Assignment::from_matches(matched, dets.len())
}

pub fn optimal(tracks: &[na::Point2<f64>], dets: &[na::Point2<f64>], threshold: f64) -> Assignment {
    if tracks.is_empty() || dets.is_empty() {
        return Assignment::from_matches(Vec::new(), dets.len());
    }

    let n = tracks.len().max(dets.len());
    let cost = |r: usize, c: usize| -> Option<f64> {
        if r < tracks.len() && c < dets.len() {
            let d = na::distance(&tracks[r], &dets[c]);

            if d < threshold {
                return Some(d);
            }
        }

        None
    };

    let mut mat = WeightMatrix::from_fn(n, |(r, c)| cost(r, c).unwrap_or(FORBIDDEN_COST));

    match solve_assignment(&mut mat) {
        Ok(positions) => {
            let mut matched: Vec<_> = positions
                .into_iter()
                .filter_map(|p| cost(p.row, p.column).map(|d| (p.row, p.column, d)))
                .collect();

            matched.sort_by_key(|&(t, _, _)| t);

            Assignment::from_matches(matched, dets.len())
        }
        Err(err) => {
            warn!("Assignment could not be solved ({:?}), using greedy", err);

            greedy(tracks, dets, threshold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(v: &[(f64, f64)]) -> Vec<na::Point2<f64>> {
        v.iter().map(|&(x, y)| na::Point2::new(x, y)).collect()
    }

    #[test]
    fn greedy_first_track_steals() {
        // track 0 is closest to det 0, but det 0 is the only option for track 1
        let tracks = pts(&[(0.0, 0.0), (-8.0, 0.0)]);
        let dets = pts(&[(-3.0, 0.0), (5.0, 0.0)]);

        let a = greedy(&tracks, &dets, 10.0);

        assert_eq!(a.matched, vec![(0, 0, 3.0)]);
        assert_eq!(a.missed, vec![1]);
    }

    #[test]
    fn optimal_resolves_stealing() {
        let tracks = pts(&[(0.0, 0.0), (-8.0, 0.0)]);
        let dets = pts(&[(-3.0, 0.0), (5.0, 0.0)]);

        let a = optimal(&tracks, &dets, 10.0);

        assert_eq!(a.matched, vec![(0, 1, 5.0), (1, 0, 5.0)]);
        assert!(a.missed.is_empty());
    }

    #[test]
    fn ties_go_to_first_detection() {
        let tracks = pts(&[(0.0, 0.0)]);
        let dets = pts(&[(0.0, 4.0), (4.0, 0.0)]);

        let a = greedy(&tracks, &dets, 10.0);

        assert_eq!(a.matched, vec![(0, 0, 4.0)]);
    }

    #[test]
    fn threshold_is_strict() {
        let tracks = pts(&[(0.0, 0.0)]);
        let dets = pts(&[(10.0, 0.0)]);

        for strategy in [AssignmentStrategy::Greedy, AssignmentStrategy::Optimal] {
            let a = assign(strategy, &tracks, &dets, 10.0);

            assert!(a.matched.is_empty());
            assert_eq!(a.missed, vec![0]);
        }
    }

    #[test]
    fn more_tracks_than_detections() {
        let tracks = pts(&[(0.0, 0.0), (50.0, 0.0), (100.0, 0.0)]);
        let dets = pts(&[(98.0, 0.0)]);

        let a = optimal(&tracks, &dets, 10.0);

        assert_eq!(a.matched, vec![(2, 0, 2.0)]);
        assert!(a.missed.is_empty());
    }
}
