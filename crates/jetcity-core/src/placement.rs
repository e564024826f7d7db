//! Random land placement.
//!
//! Rejection sampling over the terrain raster. Every caller threads its own
//! RNG handle through, so runs with the same seed place entities identically.

use crate::errors::PlacementError;
use crate::geometry::Point;
use crate::terrain::{Terrain, TerrainMap};
use rand::Rng;

/// Bounded attempt count for rejection sampling.
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 1000;

/// Pick a uniformly random land point within
/// `[margin, width - margin] x [margin, height - margin]`.
///
/// Water samples are rejected and retried up to `MAX_PLACEMENT_ATTEMPTS`
/// times; exhaustion fails with `NoLandFound` rather than ever returning a
/// water point. The rest of the engine relies on that guarantee.
pub fn random_land_point(
    map: &TerrainMap,
    rng: &mut impl Rng,
    margin: u32,
) -> Result<Point, PlacementError> {
    let low_x = margin as f64;
    let high_x = map.width() as f64 - margin as f64;
    let low_y = margin as f64;
    let high_y = map.height() as f64 - margin as f64;

    if low_x >= high_x || low_y >= high_y {
        // Margin leaves no interior to sample from.
        return Err(PlacementError::NoLandFound { attempts: 0 });
    }

    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let candidate = Point::new(rng.gen_range(low_x..high_x), rng.gen_range(low_y..high_y));
        match map.classify_point(candidate) {
            Ok(Terrain::Land) => return Ok(candidate),
            Ok(Terrain::Water) => continue,
            // Unreachable with the bounds above, but never mask it as land.
            Err(_) => continue,
        }
    }

    Err(PlacementError::NoLandFound {
        attempts: MAX_PLACEMENT_ATTEMPTS,
    })
}
