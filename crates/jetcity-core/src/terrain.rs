//! Land/water classification over the city raster.
//!
//! The raster is sampled once at configuration time and immutable afterwards.
//! Every placement decision in the engine goes through `TerrainMap::classify`.

use crate::errors::{ConfigError, TerrainError};
use crate::geometry::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Land,
    Water,
}

/// Immutable RGB raster of the city map.
#[derive(Debug, Clone)]
pub struct TerrainMap {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl TerrainMap {
    /// Build a map from a packed RGB8 buffer (row-major, `width * height * 3`
    /// bytes). Dimension or length mismatches are fatal.
    pub fn from_rgb8(width: u32, height: u32, data: &[u8]) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::BadRaster(format!(
                "zero dimension: {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ConfigError::BadRaster(format!(
                "buffer length {} does not match {width}x{height} RGB ({expected})",
                data.len()
            )));
        }
        let pixels = data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Uniform single-color map. Handy for scenarios and tests.
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::BadRaster(format!(
                "zero dimension: {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: vec![rgb; width as usize * height as usize],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Classify a pixel as land or water.
    ///
    /// Pure function of the raster, O(1). Out-of-bounds coordinates fail with
    /// `TerrainError::OutOfBounds`; they never report a default terrain.
    pub fn classify(&self, x: i64, y: i64) -> Result<Terrain, TerrainError> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return Err(TerrainError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let idx = y as usize * self.width as usize + x as usize;
        let [r, g, b] = self.pixels[idx];
        Ok(classify_rgb(r, g, b))
    }

    /// Classify the pixel under a continuous map point.
    pub fn classify_point(&self, point: Point) -> Result<Terrain, TerrainError> {
        self.classify(point.x.floor() as i64, point.y.floor() as i64)
    }

    /// Whether a continuous point lies inside the raster.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0.0
            && point.y >= 0.0
            && point.x < self.width as f64
            && point.y < self.height as f64
    }
}

/// Water detection rule over an RGB sample.
///
/// Kept bit-for-bit compatible with the pre-generated placement data: a pixel
/// is water if it is distinctly blue (a), bright blue-dominant (b), or a dark
/// blue shade (c).
fn classify_rgb(r: u8, g: u8, b: u8) -> Terrain {
    let (r, g, b) = (r as i32, g as i32, b as i32);

    let distinctly_blue = b > r + 20 && b > g + 20;
    let bright_blue = b > 150 && b > r && b > g;
    let dark_blue = r < 100 && g < 150 && b > 100 && (b - r) > 30;

    if distinctly_blue || bright_blue || dark_blue {
        Terrain::Water
    } else {
        Terrain::Land
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(TerrainMap::from_rgb8(0, 10, &[]).is_err());
        assert!(TerrainMap::uniform(10, 0, [0, 0, 0]).is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = TerrainMap::from_rgb8(2, 2, &[0u8; 11]);
        assert!(matches!(err, Err(ConfigError::BadRaster(_))));
    }

    #[test]
    fn test_distinctly_blue_is_water() {
        assert_eq!(classify_rgb(50, 60, 90), Terrain::Water);
    }

    #[test]
    fn test_bright_blue_is_water() {
        // Fails rule (a) (within 20 of green) but passes rule (b).
        assert_eq!(classify_rgb(140, 145, 160), Terrain::Water);
    }

    #[test]
    fn test_dark_blue_is_water() {
        // b=120 <= 150 and within 20 of g, so only rule (c) catches it.
        assert_eq!(classify_rgb(80, 110, 120), Terrain::Water);
    }

    #[test]
    fn test_grey_and_green_are_land() {
        assert_eq!(classify_rgb(128, 128, 128), Terrain::Land);
        assert_eq!(classify_rgb(60, 160, 60), Terrain::Land);
        assert_eq!(classify_rgb(200, 180, 150), Terrain::Land);
    }

    #[test]
    fn test_classify_is_deterministic_and_total() {
        let mut data = Vec::new();
        for i in 0..16u8 {
            data.extend_from_slice(&[i * 16, 255 - i * 16, i * 8]);
        }
        let map = TerrainMap::from_rgb8(4, 4, &data).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let first = map.classify(x, y).unwrap();
                let second = map.classify(x, y).unwrap();
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_out_of_bounds_fails() {
        let map = TerrainMap::uniform(8, 8, [100, 100, 100]).unwrap();
        assert!(map.classify(8, 0).is_err());
        assert!(map.classify(0, 8).is_err());
        assert!(map.classify(-1, 3).is_err());
        assert!(map.classify(3, -1).is_err());
    }
}
