//! Raster metadata and its process-wide resolver.

use crate::source::RasterSource;
use crate::{DemError, Result};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Geographic bounding box of the full raster, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// West edge (longitude).
    pub min_x: f64,
    /// South edge (latitude).
    pub min_y: f64,
    /// East edge (longitude).
    pub max_x: f64,
    /// North edge (latitude).
    pub max_y: f64,
}

/// Geospatial description of a raster.
///
/// Resolved once per process and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Geographic extent.
    pub bbox: BoundingBox,
    /// Degrees of longitude per pixel.
    pub pixel_width: f64,
    /// Degrees of latitude per pixel (always positive, rows grow southward).
    pub pixel_height: f64,
    /// No-data sentinel, if the raster declares one.
    pub no_data: Option<f32>,
}

impl RasterMetadata {
    /// Build metadata from the raster's top-left corner and pixel scale.
    pub fn from_origin(
        width: u32,
        height: u32,
        origin_lon: f64,
        origin_lat: f64,
        pixel_width: f64,
        pixel_height: f64,
        no_data: Option<f32>,
    ) -> Self {
        let pixel_height = pixel_height.abs();
        Self {
            width,
            height,
            bbox: BoundingBox {
                min_x: origin_lon,
                min_y: origin_lat - height as f64 * pixel_height,
                max_x: origin_lon + width as f64 * pixel_width,
                max_y: origin_lat,
            },
            pixel_width,
            pixel_height,
            no_data,
        }
    }

    /// Whether `value` is a usable elevation for this raster.
    pub fn is_valid(&self, value: f32) -> bool {
        is_valid_sample(value, self.no_data)
    }
}

/// A sample is valid when finite and not the no-data sentinel.
#[inline]
pub fn is_valid_sample(value: f32, no_data: Option<f32>) -> bool {
    value.is_finite() && no_data != Some(value)
}

/// Resolves a source's metadata on first use and caches it.
///
/// Concurrent callers share one resolution; a failed attempt leaves the cache
/// empty so the next caller retries.
#[derive(Debug)]
pub struct MetadataResolver<S> {
    source: S,
    metadata: OnceCell<RasterMetadata>,
}

impl<S: RasterSource> MetadataResolver<S> {
    /// Create a resolver over a raster source.
    pub fn new(source: S) -> Self {
        Self {
            source,
            metadata: OnceCell::new(),
        }
    }

    /// The underlying raster source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve the raster metadata, opening the source on first call.
    pub async fn resolve(&self) -> Result<&RasterMetadata> {
        self.metadata
            .get_or_try_init(|| async {
                debug!("Resolving raster metadata");
                match self.source.open_metadata().await {
                    Ok(meta) => {
                        debug!(
                            "Raster is {}x{} px, pixel {:.6}x{:.6} deg, no-data {:?}",
                            meta.width, meta.height, meta.pixel_width, meta.pixel_height, meta.no_data
                        );
                        Ok(meta)
                    }
                    Err(DemError::SourceUnavailable(reason)) => {
                        warn!("Raster source unavailable: {}", reason);
                        Err(DemError::SourceUnavailable(reason))
                    }
                    Err(e) => {
                        warn!("Raster source unavailable: {}", e);
                        Err(DemError::SourceUnavailable(e.to_string()))
                    }
                }
            })
            .await
    }

    /// Metadata if it has already been resolved.
    pub fn cached(&self) -> Option<&RasterMetadata> {
        self.metadata.get()
    }
}
