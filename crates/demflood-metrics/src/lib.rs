//! Metrics infrastructure for demflood.
//!
//! Every metric emitted by the tile pipeline and the flood engine is declared
//! here as a [`Metric`] constant, so names stay consistent between the code
//! that records them and the exporter that describes them.
//!
//! # Example
//!
//! ```rust
//! use demflood_metrics::metric_defs;
//!
//! // Register descriptions once at startup
//! demflood_metrics::describe_metrics();
//!
//! metrics::counter!(metric_defs::FETCH_BYTES.name).increment(4096);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use demflood_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const TILES: Metric = Metric::counter("demflood.reader.tiles")
///     .with_description("Tiles read")
///     .with_unit(Unit::Count);
///
/// assert_eq!(TILES.name, "demflood.reader.tiles");
/// assert_eq!(TILES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "demflood.fetch.bytes").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
        }
    }

    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions used by demflood.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Transport
    // ========================================================================

    /// Bytes received from the raster transport.
    pub const FETCH_BYTES: Metric = Metric::counter("demflood.fetch.bytes")
        .with_description("Bytes received from the raster transport")
        .with_unit(Unit::Bytes);

    /// Range requests issued against the raster source.
    pub const FETCH_REQUESTS: Metric = Metric::counter("demflood.fetch.requests")
        .with_description("Range requests issued against the raster source")
        .with_unit(Unit::Count);

    // ========================================================================
    // Window Reader
    // ========================================================================

    /// Row chunks read by the window reader.
    pub const READER_CHUNKS: Metric = Metric::counter("demflood.reader.chunks")
        .with_description("Row chunks read by the window reader")
        .with_unit(Unit::Count);

    /// Windows that completed with usable elevation data.
    pub const READER_TILES: Metric = Metric::counter("demflood.reader.tiles")
        .with_description("Windows read to completion with valid samples")
        .with_unit(Unit::Count);

    /// Windows that contained no valid sample.
    pub const READER_EMPTY: Metric = Metric::counter("demflood.reader.empty_windows")
        .with_description("Windows that contained only no-data samples")
        .with_unit(Unit::Count);

    /// Reads abandoned because a newer selection superseded them.
    pub const READER_CANCELLED: Metric = Metric::counter("demflood.reader.cancelled")
        .with_description("Reads abandoned after being superseded")
        .with_unit(Unit::Count);

    // ========================================================================
    // Flood Engine
    // ========================================================================

    /// Flooded cells in the most recent mask.
    pub const FLOOD_CELLS: Metric = Metric::gauge("demflood.flood.cells")
        .with_description("Flooded cells in the most recent mask")
        .with_unit(Unit::Count);

    /// Wall time of a flood mask computation.
    pub const FLOOD_COMPUTE_TIME: Metric = Metric::histogram("demflood.flood.compute_time_us")
        .with_description("Flood mask computation time in microseconds")
        .with_unit(Unit::Microseconds);

    /// All declared metrics.
    pub const ALL: &[Metric] = &[
        FETCH_BYTES,
        FETCH_REQUESTS,
        READER_CHUNKS,
        READER_TILES,
        READER_EMPTY,
        READER_CANCELLED,
        FLOOD_CELLS,
        FLOOD_COMPUTE_TIME,
    ];
}

/// Describes every metric in [`metric_defs::ALL`] to the installed recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_unique() {
        let names: HashSet<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_metric_names_prefixed() {
        for metric in metric_defs::ALL {
            assert!(metric.name.starts_with("demflood."), "{}", metric.name);
            assert!(!metric.description.is_empty(), "{} lacks a description", metric.name);
        }
    }

    #[test]
    fn test_describe_without_recorder() {
        // No recorder installed: describing must be a no-op rather than a panic.
        describe_metrics();
    }
}
