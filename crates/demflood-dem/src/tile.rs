//! Elevation window data produced by a completed read.

use crate::metadata::is_valid_sample;

/// A geographic rectangle in degrees, as produced by a cell selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Minimum latitude (south edge).
    pub south: f64,
    /// Minimum longitude (west edge).
    pub west: f64,
    /// Maximum latitude (north edge).
    pub north: f64,
    /// Maximum longitude (east edge).
    pub east: f64,
}

impl GeoBounds {
    /// Create bounds from `(south, west, north, east)`.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Check if a coordinate is within the bounds.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

/// Elevation samples for one selected cell.
///
/// Created once per successful read and never mutated; a later selection
/// produces a new value instead.
#[derive(Debug, Clone)]
pub struct TileData {
    /// Elevation data in row-major order (north to south, west to east).
    values: Vec<f32>,
    /// Width in pixels.
    width: u32,
    /// Height in pixels.
    height: u32,
    /// Smallest valid sample.
    min: f32,
    /// Largest valid sample.
    max: f32,
    /// Geographic rectangle the window was read for.
    bounds: GeoBounds,
    /// No-data sentinel of the source raster.
    no_data: Option<f32>,
}

impl TileData {
    /// Wrap a sample buffer, scanning it once for its valid range.
    ///
    /// Returns `None` when no sample is finite and distinct from `no_data`.
    ///
    /// # Panics
    /// Panics if `values.len() != width * height`.
    pub fn from_samples(
        values: Vec<f32>,
        width: u32,
        height: u32,
        bounds: GeoBounds,
        no_data: Option<f32>,
    ) -> Option<Self> {
        assert_eq!(
            values.len(),
            width as usize * height as usize,
            "sample buffer does not match {}x{}",
            width,
            height
        );

        let (min, max) = values
            .iter()
            .copied()
            .filter(|&v| is_valid_sample(v, no_data))
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;

        Some(Self {
            values,
            width,
            height,
            min,
            max,
            bounds,
            no_data,
        })
    }

    /// Elevation samples in row-major order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest valid elevation.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Largest valid elevation.
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Geographic rectangle of the window.
    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// No-data sentinel of the source raster.
    pub fn no_data(&self) -> Option<f32> {
        self.no_data
    }

    /// Whether `value` is a usable elevation in this tile.
    #[inline]
    pub fn is_valid(&self, value: f32) -> bool {
        is_valid_sample(value, self.no_data)
    }

    /// Sample the nearest cell at a geographic coordinate.
    ///
    /// Returns `None` outside the tile bounds or on a no-data cell.
    pub fn sample(&self, lat: f64, lon: f64) -> Option<f32> {
        if !self.bounds.contains(lat, lon) {
            return None;
        }
        let lat_ratio = (self.bounds.north - lat) / (self.bounds.north - self.bounds.south).max(1e-6);
        let lon_ratio = (lon - self.bounds.west) / (self.bounds.east - self.bounds.west).max(1e-6);
        let row = ((lat_ratio * self.height as f64).floor() as u32).min(self.height - 1);
        let col = ((lon_ratio * self.width as f64).floor() as u32).min(self.width - 1);

        let value = self.values[(row * self.width + col) as usize];
        self.is_valid(value).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> GeoBounds {
        GeoBounds::new(13.0, 100.0, 13.02, 100.02)
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = bounds();
        assert!(bounds.contains(13.01, 100.01));
        assert!(bounds.contains(13.0, 100.0)); // Corner
        assert!(!bounds.contains(12.99, 100.01));
        assert!(!bounds.contains(13.01, 100.03));
    }

    #[test]
    fn test_stats_skip_no_data_and_non_finite() {
        let values = vec![-9999.0, 4.0, f32::NAN, 12.5];
        let tile = TileData::from_samples(values, 2, 2, bounds(), Some(-9999.0)).unwrap();
        assert_eq!(tile.min(), 4.0);
        assert_eq!(tile.max(), 12.5);
        assert_eq!(tile.len(), 4);
    }

    #[test]
    fn test_all_no_data_is_empty() {
        let values = vec![-9999.0; 9];
        assert!(TileData::from_samples(values, 3, 3, bounds(), Some(-9999.0)).is_none());
        let values = vec![f32::NAN; 4];
        assert!(TileData::from_samples(values, 2, 2, bounds(), None).is_none());
    }

    #[test]
    #[should_panic]
    fn test_mismatched_buffer_panics() {
        TileData::from_samples(vec![1.0; 3], 2, 2, bounds(), None);
    }

    #[test]
    fn test_sample_nearest() {
        // Row 0 is north
        let values = vec![1.0, 2.0, 3.0, -9999.0];
        let tile = TileData::from_samples(values, 2, 2, bounds(), Some(-9999.0)).unwrap();
        assert_eq!(tile.sample(13.015, 100.005), Some(1.0));
        assert_eq!(tile.sample(13.015, 100.015), Some(2.0));
        assert_eq!(tile.sample(13.005, 100.005), Some(3.0));
        assert_eq!(tile.sample(13.005, 100.015), None);
        assert_eq!(tile.sample(14.0, 100.005), None);
        // South edge clamps into the last row
        assert_eq!(tile.sample(13.0, 100.0), Some(3.0));
    }
}
