//! Error types for the DEM crate.

use thiserror::Error;

/// Errors that can occur while acquiring elevation data.
#[derive(Debug, Error)]
pub enum DemError {
    /// The raster could not be opened or its header could not be parsed.
    ///
    /// Every pending and future read fails with this until the source is
    /// resolved successfully.
    #[error("Raster source unavailable: {0}")]
    SourceUnavailable(String),

    /// A window read failed part way through. Partial data was discarded.
    #[error("Window read failed after {rows_read} of {rows_total} rows: {reason}")]
    ReadFailure {
        /// Rows successfully read before the failure.
        rows_read: u32,
        /// Rows requested.
        rows_total: u32,
        /// Reason for failure.
        reason: String,
    },

    /// I/O error reading a local file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing required tags or unsupported layout.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// HTTP request error.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The server answered a range request with a non-success status.
    #[error("Range request for {url} failed: HTTP {status}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// A source returned a buffer that does not match the requested window.
    #[error("Source returned {actual} samples, expected {expected}")]
    SampleCountMismatch {
        /// Samples expected for the requested rows.
        expected: usize,
        /// Samples returned.
        actual: usize,
    },
}

impl DemError {
    /// Whether the error originates from the raster header rather than a
    /// single window.
    pub fn is_source_error(&self) -> bool {
        matches!(self, DemError::SourceUnavailable(_))
    }
}
