//! # demflood-dem
//!
//! Windowed elevation reads from very large remote GeoTIFF rasters.
//!
//! The crate never loads a whole raster. A selection rectangle is mapped to a
//! pixel window, the window is read in row chunks through byte-range requests,
//! and the result is an immutable [`TileData`] with its valid elevation range.
//!
//! ## Overview
//!
//! - [`MetadataResolver`] opens the raster header once per process and caches
//!   its size, extent, pixel scale and no-data value.
//! - [`PixelWindow`] maps a geographic rectangle to clamped pixel bounds.
//! - [`ChunkedWindowReader`] reads a window chunk by chunk, checking a
//!   [`Generation`] between chunks so superseded reads stop early.
//! - [`TransportWithProgress`] wraps a [`Transport`] and feeds a
//!   [`ProgressMonitor`] with the bytes of the tracked raster.
//! - [`GeoTiffSource`] implements [`RasterSource`] over any transport, caching
//!   fetched blocks so repeated windows reuse header and strip bytes.
//!
//! ## Example
//!
//! ```no_run
//! use demflood_dem::{
//!     ChunkedWindowReader, GeoBounds, GeoTiffSource, HttpTransport, MetadataResolver,
//!     ReadOutcome, RequestGeneration,
//! };
//! use std::time::Duration;
//!
//! # async fn run() -> demflood_dem::Result<()> {
//! let url = "https://example.com/dem.tif";
//! let source = GeoTiffSource::new(url, HttpTransport::new(Duration::from_secs(30))?);
//! let resolver = MetadataResolver::new(source);
//! let meta = resolver.resolve().await?;
//!
//! let generation = RequestGeneration::new().advance();
//! let bounds = GeoBounds::new(13.70, 100.50, 13.72, 100.52);
//! match ChunkedWindowReader::new()
//!     .read(resolver.source(), meta, bounds, &generation)
//!     .await?
//! {
//!     ReadOutcome::Tile(tile) => println!("{:.1}..{:.1} m", tile.min(), tile.max()),
//!     ReadOutcome::Empty => println!("no data"),
//!     ReadOutcome::Cancelled => {}
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod generation;
mod geotiff;
mod metadata;
mod progress;
mod reader;
mod source;
mod tile;
mod transport;
mod window;

pub use error::DemError;
pub use generation::{Generation, RequestGeneration};
pub use geotiff::{GeoTiffSource, SparseReader, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};
pub use metadata::{is_valid_sample, BoundingBox, MetadataResolver, RasterMetadata};
pub use progress::{
    streaming_percent, DownloadTracker, Progress, ProgressMonitor, MAX_STREAMING_PERCENT,
    MIN_STREAMING_PERCENT,
};
pub use reader::{chunk_height, ChunkedWindowReader, ReadOutcome, MAX_CHUNK_ROWS};
pub use source::RasterSource;
pub use tile::{GeoBounds, TileData};
pub use transport::{
    BufferedBody, FileTransport, HttpBody, HttpTransport, MemoryTransport, ProgressBody, RangeRequest,
    ResponseBody, Transport, TransportResponse, TransportWithProgress,
};
pub use window::{lat_to_row, lon_to_col, PixelWindow};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
