//! Geographic rectangle to pixel window mapping.

use crate::metadata::RasterMetadata;
use crate::tile::GeoBounds;

/// Map a longitude to a pixel column, clamped to `[0, width]`.
pub fn lon_to_col(lon: f64, meta: &RasterMetadata) -> u32 {
    clamp_index((lon - meta.bbox.min_x) / meta.pixel_width, meta.width)
}

/// Map a latitude to a pixel row, clamped to `[0, height]`.
///
/// Row 0 is the north edge of the raster.
pub fn lat_to_row(lat: f64, meta: &RasterMetadata) -> u32 {
    clamp_index((meta.bbox.max_y - lat) / meta.pixel_height, meta.height)
}

fn clamp_index(position: f64, limit: u32) -> u32 {
    let index = position.floor();
    if index.is_nan() || index <= 0.0 {
        0
    } else if index >= limit as f64 {
        limit
    } else {
        index as u32
    }
}

/// A rectangular region of the raster in pixel coordinates.
///
/// Start bounds are inclusive, end bounds exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    /// First column.
    pub col_start: u32,
    /// One past the last column.
    pub col_end: u32,
    /// First row (north).
    pub row_start: u32,
    /// One past the last row (south).
    pub row_end: u32,
}

impl PixelWindow {
    /// Compute the pixel window covering a geographic rectangle.
    pub fn from_bounds(meta: &RasterMetadata, bounds: &GeoBounds) -> Self {
        let col_start = lon_to_col(bounds.west, meta);
        let row_start = lat_to_row(bounds.north, meta);
        Self {
            col_start,
            col_end: lon_to_col(bounds.east, meta).max(col_start),
            row_start,
            row_end: lat_to_row(bounds.south, meta).max(row_start),
        }
    }

    /// Number of columns to read, never less than one.
    pub fn read_width(&self) -> u32 {
        (self.col_end - self.col_start).max(1)
    }

    /// Number of rows to read, never less than one.
    pub fn read_height(&self) -> u32 {
        (self.row_end - self.row_start).max(1)
    }

    /// Total samples a read of this window produces.
    pub fn pixel_count(&self) -> usize {
        self.read_width() as usize * self.read_height() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> RasterMetadata {
        // 1000 x 500 pixels, 0.01 degrees each, top-left at (96.0, 22.0)
        RasterMetadata::from_origin(1000, 500, 96.0, 22.0, 0.01, 0.01, None)
    }

    #[test]
    fn test_lon_to_col() {
        let meta = meta();
        assert_eq!(lon_to_col(96.0, &meta), 0);
        assert_eq!(lon_to_col(96.505, &meta), 50);
        assert_eq!(lon_to_col(95.0, &meta), 0);
        assert_eq!(lon_to_col(120.0, &meta), 1000);
        assert_eq!(lon_to_col(f64::NAN, &meta), 0);
    }

    #[test]
    fn test_lat_to_row() {
        let meta = meta();
        assert_eq!(lat_to_row(22.0, &meta), 0);
        assert_eq!(lat_to_row(21.995, &meta), 0);
        assert_eq!(lat_to_row(21.0, &meta), 100);
        assert_eq!(lat_to_row(30.0, &meta), 0);
        assert_eq!(lat_to_row(10.0, &meta), 500);
    }

    #[test]
    fn test_window_from_bounds() {
        let meta = meta();
        let bounds = GeoBounds::new(21.5, 96.2, 21.7, 96.4);
        let window = PixelWindow::from_bounds(&meta, &bounds);
        assert_eq!(window.col_start, 20);
        assert_eq!(window.col_end, 40);
        assert_eq!(window.row_start, 30);
        assert_eq!(window.row_end, 50);
        assert_eq!(window.read_width(), 20);
        assert_eq!(window.read_height(), 20);
        assert_eq!(window.pixel_count(), 400);
    }

    #[test]
    fn test_degenerate_window_is_one_pixel() {
        let meta = meta();
        let bounds = GeoBounds::new(21.0, 97.0, 21.0, 97.0);
        let window = PixelWindow::from_bounds(&meta, &bounds);
        assert_eq!(window.col_start, window.col_end);
        assert_eq!(window.read_width(), 1);
        assert_eq!(window.read_height(), 1);
    }

    #[test]
    fn test_window_outside_raster_clamps() {
        let meta = meta();
        let bounds = GeoBounds::new(0.0, 110.0, 1.0, 111.0);
        let window = PixelWindow::from_bounds(&meta, &bounds);
        assert_eq!(window.col_start, 1000);
        assert_eq!(window.row_start, 500);
        assert_eq!(window.pixel_count(), 1);
    }
}
