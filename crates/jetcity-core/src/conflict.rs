//! Proximity conflict detection between airborne agents.
//!
//! The scan is a naive O(n²) pass over the per-tick position list, which is
//! comfortable at hundreds of agents. Partitioning the map into a coarse grid
//! is the upgrade path for thousands; see DESIGN.md.
//!
//! Output is advisory only. Collaborators turn conflict pairs into accident
//! reports; the detector never touches agent state.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// An unordered proximity pair, reported once per tick.
///
/// Callsigns are sorted within the pair so (a, b) and (b, a) are the same
/// conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub first: String,
    pub second: String,
    pub distance_px: f64,
}

/// Pairwise proximity scanner.
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    pub proximity_threshold_px: f64,
}

impl CollisionDetector {
    pub fn new(proximity_threshold_px: f64) -> Self {
        Self {
            proximity_threshold_px,
        }
    }

    /// Find every pair of agents closer than the proximity threshold.
    pub fn find_conflicts(&self, positions: &[(String, Point)]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let (id_a, pos_a) = &positions[i];
                let (id_b, pos_b) = &positions[j];
                let distance = pos_a.distance_to(*pos_b);
                if distance < self.proximity_threshold_px {
                    let (first, second) = if id_a <= id_b {
                        (id_a.clone(), id_b.clone())
                    } else {
                        (id_b.clone(), id_a.clone())
                    };
                    conflicts.push(Conflict {
                        first,
                        second,
                        distance_px: distance,
                    });
                }
            }
        }
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(list: &[(&str, f64, f64)]) -> Vec<(String, Point)> {
        list.iter()
            .map(|(id, x, y)| (id.to_string(), Point::new(*x, *y)))
            .collect()
    }

    #[test]
    fn test_no_conflict_when_far_apart() {
        let detector = CollisionDetector::new(12.0);
        let conflicts =
            detector.find_conflicts(&positions(&[("JET-001", 0.0, 0.0), ("JET-002", 50.0, 50.0)]));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_conflict_when_close() {
        let detector = CollisionDetector::new(12.0);
        let conflicts =
            detector.find_conflicts(&positions(&[("JET-001", 0.0, 0.0), ("JET-002", 5.0, 5.0)]));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].first, "JET-001");
        assert_eq!(conflicts[0].second, "JET-002");
    }

    #[test]
    fn test_pair_reported_once_regardless_of_order() {
        let detector = CollisionDetector::new(12.0);
        let forward =
            detector.find_conflicts(&positions(&[("JET-001", 0.0, 0.0), ("JET-002", 3.0, 0.0)]));
        let reversed =
            detector.find_conflicts(&positions(&[("JET-002", 3.0, 0.0), ("JET-001", 0.0, 0.0)]));
        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 1);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let detector = CollisionDetector::new(10.0);
        let at_threshold =
            detector.find_conflicts(&positions(&[("JET-001", 0.0, 0.0), ("JET-002", 10.0, 0.0)]));
        assert!(at_threshold.is_empty());
        let inside =
            detector.find_conflicts(&positions(&[("JET-001", 0.0, 0.0), ("JET-002", 9.99, 0.0)]));
        assert_eq!(inside.len(), 1);
    }

    #[test]
    fn test_three_way_cluster_reports_all_pairs() {
        let detector = CollisionDetector::new(12.0);
        let conflicts = detector.find_conflicts(&positions(&[
            ("JET-001", 0.0, 0.0),
            ("JET-002", 4.0, 0.0),
            ("JET-003", 8.0, 0.0),
        ]));
        assert_eq!(conflicts.len(), 3);
    }
}
