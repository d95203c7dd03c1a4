//! The raster source abstraction consumed by the window reader.

use crate::metadata::RasterMetadata;
use crate::Result;
use std::future::Future;
use std::ops::Range;

/// A raster that can describe itself and hand out rectangular pixel windows.
///
/// `read_window` returns samples of band 0 in row-major order, exactly
/// `cols.len() * rows.len()` of them. Pixels outside the raster are filled
/// with the no-data sentinel (or NaN when the raster has none).
pub trait RasterSource: Send + Sync {
    /// Read the raster header.
    fn open_metadata(&self) -> impl Future<Output = Result<RasterMetadata>> + Send;

    /// Read the samples of a pixel window.
    fn read_window(
        &self,
        cols: Range<u32>,
        rows: Range<u32>,
    ) -> impl Future<Output = Result<Vec<f32>>> + Send;
}
