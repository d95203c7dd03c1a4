//! Chunked, cancellable window reads.
//!
//! A window is read as a sequence of horizontal row chunks. Between chunks the
//! reader checks whether its request generation is still current and reports
//! row progress, so a superseded selection stops at the next chunk boundary
//! and a long read keeps its progress indicator moving.

use crate::generation::Generation;
use crate::metadata::RasterMetadata;
use crate::progress::{streaming_percent, ProgressMonitor};
use crate::source::RasterSource;
use crate::tile::{GeoBounds, TileData};
use crate::window::PixelWindow;
use crate::{DemError, Result};
use demflood_metrics::metric_defs;
use std::sync::Arc;
use tracing::{debug, trace};

/// Default upper bound on rows per chunk.
pub const MAX_CHUNK_ROWS: u32 = 256;

/// Result of a window read that did not fail.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// The window contained at least one valid sample.
    Tile(TileData),
    /// Every sample was no-data or non-finite.
    Empty,
    /// A newer request superseded this one; partial data was dropped.
    Cancelled,
}

impl ReadOutcome {
    /// The tile, if the read produced one.
    pub fn tile(self) -> Option<TileData> {
        match self {
            ReadOutcome::Tile(tile) => Some(tile),
            _ => None,
        }
    }

    /// Whether the read was abandoned for a newer request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReadOutcome::Cancelled)
    }
}

/// Rows per chunk for a window of `total_rows`.
///
/// Aims for about eight chunks per window, capped at `max_rows` and never
/// below one row.
pub fn chunk_height(total_rows: u32, remaining: u32, max_rows: u32) -> u32 {
    let target = (total_rows / 8).max(1);
    max_rows.max(1).min(remaining).min(target)
}

/// Reads pixel windows from a raster source in row chunks.
#[derive(Debug)]
pub struct ChunkedWindowReader {
    max_chunk_rows: u32,
    progress: Option<Arc<ProgressMonitor>>,
}

impl Default for ChunkedWindowReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedWindowReader {
    /// Create a reader with the default chunk bound and no progress reporting.
    pub fn new() -> Self {
        Self {
            max_chunk_rows: MAX_CHUNK_ROWS,
            progress: None,
        }
    }

    /// Set the maximum rows per chunk.
    pub fn with_max_chunk_rows(mut self, rows: u32) -> Self {
        self.max_chunk_rows = rows.max(1);
        self
    }

    /// Report row progress to a monitor.
    pub fn with_progress(mut self, monitor: Arc<ProgressMonitor>) -> Self {
        self.progress = Some(monitor);
        self
    }

    /// Maximum rows per chunk.
    pub fn max_chunk_rows(&self) -> u32 {
        self.max_chunk_rows
    }

    /// Read the window covering `bounds`.
    ///
    /// Stops with [`ReadOutcome::Cancelled`] as soon as `generation` is stale
    /// after a chunk completes. Source failures become
    /// [`DemError::ReadFailure`] carrying how many rows had been read.
    pub async fn read<S: RasterSource>(
        &self,
        source: &S,
        meta: &RasterMetadata,
        bounds: GeoBounds,
        generation: &Generation,
    ) -> Result<ReadOutcome> {
        let window = PixelWindow::from_bounds(meta, &bounds);
        let width = window.read_width();
        let total_rows = window.read_height();
        let cols = window.col_start..window.col_start + width;

        debug!(
            "Reading window cols {}..{} rows {}..{} ({} px)",
            cols.start,
            cols.end,
            window.row_start,
            window.row_start + total_rows,
            window.pixel_count()
        );

        let mut values = Vec::with_capacity(window.pixel_count());
        let mut rows_read = 0u32;

        while rows_read < total_rows {
            let rows = chunk_height(total_rows, total_rows - rows_read, self.max_chunk_rows);
            let row_start = window.row_start + rows_read;

            let chunk = source
                .read_window(cols.clone(), row_start..row_start + rows)
                .await
                .and_then(|chunk| {
                    let expected = width as usize * rows as usize;
                    if chunk.len() == expected {
                        Ok(chunk)
                    } else {
                        Err(DemError::SampleCountMismatch {
                            expected,
                            actual: chunk.len(),
                        })
                    }
                })
                .map_err(|e| DemError::ReadFailure {
                    rows_read,
                    rows_total: total_rows,
                    reason: e.to_string(),
                })?;

            if generation.is_stale() {
                debug!("Window read superseded after {} of {} rows", rows_read, total_rows);
                metrics::counter!(metric_defs::READER_CANCELLED.name).increment(1);
                return Ok(ReadOutcome::Cancelled);
            }

            values.extend_from_slice(&chunk);
            rows_read += rows;
            metrics::counter!(metric_defs::READER_CHUNKS.name).increment(1);
            trace!("Read {} of {} rows", rows_read, total_rows);

            if let Some(monitor) = &self.progress {
                monitor.report(streaming_percent(rows_read as f64 / total_rows as f64));
            }
        }

        match TileData::from_samples(values, width, total_rows, bounds, meta.no_data) {
            Some(tile) => {
                debug!("Window elevation range {:.1}..{:.1}", tile.min(), tile.max());
                metrics::counter!(metric_defs::READER_TILES.name).increment(1);
                Ok(ReadOutcome::Tile(tile))
            }
            None => {
                metrics::counter!(metric_defs::READER_EMPTY.name).increment(1);
                Ok(ReadOutcome::Empty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::RequestGeneration;
    use crate::progress::Progress;
    use parking_lot::Mutex;
    use std::ops::Range;

    const NO_DATA: f32 = -9999.0;

    /// Synthetic raster where each sample encodes its row, with hooks to fail
    /// or supersede a read part way through.
    struct GridSource {
        meta: RasterMetadata,
        fill: Option<f32>,
        fail_at_row: Option<u32>,
        advance_after_reads: Option<(usize, RequestGeneration)>,
        reads: Mutex<Vec<Range<u32>>>,
    }

    impl GridSource {
        fn new(width: u32, height: u32) -> Self {
            Self {
                meta: RasterMetadata::from_origin(width, height, 100.0, 14.0, 0.125, 0.125, Some(NO_DATA)),
                fill: None,
                fail_at_row: None,
                advance_after_reads: None,
                reads: Mutex::new(Vec::new()),
            }
        }

        fn full_bounds(&self) -> GeoBounds {
            let bbox = self.meta.bbox;
            GeoBounds::new(bbox.min_y, bbox.min_x, bbox.max_y, bbox.max_x)
        }
    }

    impl RasterSource for GridSource {
        async fn open_metadata(&self) -> Result<RasterMetadata> {
            Ok(self.meta.clone())
        }

        async fn read_window(&self, cols: Range<u32>, rows: Range<u32>) -> Result<Vec<f32>> {
            let reads = {
                let mut reads = self.reads.lock();
                reads.push(rows.clone());
                reads.len()
            };
            if let Some((after, generation)) = &self.advance_after_reads {
                if reads == *after {
                    generation.advance();
                }
            }
            if self.fail_at_row.is_some_and(|row| rows.contains(&row)) {
                return Err(DemError::Io(std::io::Error::other("connection reset")));
            }
            tokio::task::yield_now().await;
            Ok(rows
                .flat_map(|row| cols.clone().map(move |_| row as f32))
                .map(|v| self.fill.unwrap_or(v))
                .collect())
        }
    }

    #[test]
    fn test_chunk_height() {
        assert_eq!(chunk_height(100, 100, 256), 12);
        assert_eq!(chunk_height(100, 4, 256), 4);
        assert_eq!(chunk_height(5, 5, 256), 1);
        assert_eq!(chunk_height(10_000, 10_000, 256), 256);
        assert_eq!(chunk_height(1, 1, 256), 1);
        assert_eq!(chunk_height(100, 100, 0), 1);
    }

    #[tokio::test]
    async fn test_reads_sequential_chunks() {
        let source = GridSource::new(20, 100);
        let generation = RequestGeneration::new().advance();
        let reader = ChunkedWindowReader::new();

        let outcome = reader
            .read(&source, &source.meta, source.full_bounds(), &generation)
            .await
            .unwrap();
        let tile = outcome.tile().unwrap();
        assert_eq!((tile.width(), tile.height()), (20, 100));
        assert_eq!(tile.min(), 0.0);
        assert_eq!(tile.max(), 99.0);
        assert_eq!(tile.values()[20 * 37], 37.0);

        let reads = source.reads.lock();
        assert_eq!(reads.len(), 9); // 8 chunks of 12 rows plus 4
        assert_eq!(reads[0], 0..12);
        assert_eq!(reads[8], 96..100);
        assert!(reads.windows(2).all(|pair| pair[0].end == pair[1].start));
    }

    #[tokio::test]
    async fn test_max_chunk_rows_is_respected() {
        let source = GridSource::new(4, 64);
        let generation = RequestGeneration::new().advance();
        let reader = ChunkedWindowReader::new().with_max_chunk_rows(3);

        reader
            .read(&source, &source.meta, source.full_bounds(), &generation)
            .await
            .unwrap();
        assert!(source.reads.lock().iter().all(|rows| rows.len() <= 3));
    }

    #[tokio::test]
    async fn test_stale_generation_cancels() {
        let counter = RequestGeneration::new();
        let generation = counter.advance();
        let mut source = GridSource::new(10, 80);
        source.advance_after_reads = Some((3, counter.clone()));

        let outcome = ChunkedWindowReader::new()
            .read(&source, &source.meta, source.full_bounds(), &generation)
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(source.reads.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_all_no_data_is_empty() {
        let mut source = GridSource::new(8, 8);
        source.fill = Some(NO_DATA);
        let generation = RequestGeneration::new().advance();

        let outcome = ChunkedWindowReader::new()
            .read(&source, &source.meta, source.full_bounds(), &generation)
            .await
            .unwrap();
        assert!(matches!(outcome, ReadOutcome::Empty));
    }

    #[tokio::test]
    async fn test_failure_reports_rows_read() {
        let mut source = GridSource::new(10, 80);
        source.fail_at_row = Some(25);
        let generation = RequestGeneration::new().advance();

        let err = ChunkedWindowReader::new()
            .read(&source, &source.meta, source.full_bounds(), &generation)
            .await
            .unwrap_err();
        match err {
            DemError::ReadFailure {
                rows_read,
                rows_total,
                reason,
            } => {
                assert_eq!(rows_read, 20);
                assert_eq!(rows_total, 80);
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_within_streaming_range() {
        let source = GridSource::new(10, 200);
        let monitor = Arc::new(ProgressMonitor::new());
        let mut receiver = monitor.subscribe();
        monitor.begin();
        receiver.mark_unchanged();

        let generation = RequestGeneration::new().advance();
        let reader = ChunkedWindowReader::new().with_progress(Arc::clone(&monitor));

        let read = reader.read(&source, &source.meta, source.full_bounds(), &generation);
        let observe = async {
            let mut seen = Vec::new();
            while receiver.changed().await.is_ok() {
                let Progress { percent, .. } = *receiver.borrow_and_update();
                seen.push(percent);
                if percent >= 99 {
                    break;
                }
            }
            seen
        };
        let (outcome, seen) = tokio::join!(read, observe);

        assert!(outcome.unwrap().tile().is_some());
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|p| (1..=99).contains(p)));
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(monitor.progress().percent, 99);
    }

    #[tokio::test]
    async fn test_window_south_of_raster_reads_single_row() {
        let source = GridSource::new(10, 10);
        let generation = RequestGeneration::new().advance();
        let bounds = GeoBounds::new(0.0, 0.0, 1.0, 1.0);

        ChunkedWindowReader::new()
            .read(&source, &source.meta, bounds, &generation)
            .await
            .unwrap();
        // Clamped to the raster edge, then widened to one pixel
        assert_eq!(*source.reads.lock(), vec![10..11]);
    }
}
