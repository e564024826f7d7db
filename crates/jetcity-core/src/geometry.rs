//! Planar math for steering and proximity checks.
//!
//! All coordinates are in map-pixel space. Bearings are in radians with
//! 0 pointing along +x and angles increasing toward +y.

use serde::{Deserialize, Serialize};

/// A point in map-pixel space. Copied by value everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Bearing from this point to another, in radians.
    pub fn bearing_to(&self, other: Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Offset this point by a distance along a bearing.
    pub fn offset_by_bearing(&self, distance: f64, bearing_rad: f64) -> Point {
        if distance.abs() <= f64::EPSILON {
            return *self;
        }
        Point {
            x: self.x + distance * bearing_rad.cos(),
            y: self.y + distance * bearing_rad.sin(),
        }
    }
}

/// Minimum distance from a point to the segment `[a, b]`.
pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let sx = b.x - a.x;
    let sy = b.y - a.y;
    let seg_len_sq = sx * sx + sy * sy;

    if seg_len_sq < 1e-12 {
        // Segment is essentially a point
        return point.distance_to(a);
    }

    // Project point onto segment line: t = ((P-A) . (B-A)) / |B-A|^2
    let px = point.x - a.x;
    let py = point.y - a.y;
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);

    let closest = Point::new(a.x + t * sx, a.y + t * sy);
    point.distance_to(closest)
}

/// Closest point on the segment `[a, b]` to `point`.
pub fn closest_point_on_segment(point: Point, a: Point, b: Point) -> Point {
    let sx = b.x - a.x;
    let sy = b.y - a.y;
    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 1e-12 {
        return a;
    }
    let px = point.x - a.x;
    let py = point.y - a.y;
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    Point::new(a.x + t * sx, a.y + t * sy)
}

/// Check whether the segment `[a, b]` passes within `radius` of `center`.
pub fn segment_intersects_circle(a: Point, b: Point, center: Point, radius: f64) -> bool {
    distance_to_segment(center, a, b) < radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_known_values() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(b) - 5.0).abs() < 1e-9);
        assert!((b.distance_to(a) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Point::new(10.0, 10.0);
        assert!((origin.bearing_to(Point::new(20.0, 10.0)) - 0.0).abs() < 1e-9);
        let north = origin.bearing_to(Point::new(10.0, 20.0));
        assert!((north - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_offset_round_trip() {
        let origin = Point::new(50.0, 50.0);
        let target = Point::new(80.0, 20.0);
        let bearing = origin.bearing_to(target);
        let dist = origin.distance_to(target);
        let moved = origin.offset_by_bearing(dist, bearing);
        assert!(moved.distance_to(target) < 1e-9);
    }

    #[test]
    fn test_distance_to_segment_projects_inside() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let d = distance_to_segment(Point::new(5.0, 3.0), a, b);
        assert!((d - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_segment_clamps_to_endpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let d = distance_to_segment(Point::new(14.0, 3.0), a, b);
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_circle_intersection() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(100.0, 0.0);
        assert!(segment_intersects_circle(a, b, Point::new(50.0, 5.0), 10.0));
        assert!(!segment_intersects_circle(a, b, Point::new(50.0, 20.0), 10.0));
    }
}
