//! GeoTIFF raster source over byte-range requests.
//!
//! The remote file is never downloaded in full. Bytes are fetched in aligned
//! blocks into a sparse cache, and the `tiff` decoder reads through a
//! [`SparseReader`] that serves cached blocks and records the first range it
//! could not serve. Header parsing is retried after each missing range is
//! fetched; window reads prefetch the byte ranges of every strip or tile they
//! overlap before decoding.
//!
//! Georeferencing is taken from the GeoTIFF ModelPixelScale/ModelTiepoint pair
//! (or a non-rotated ModelTransformation), and the no-data value from the
//! GDAL_NODATA tag.

use crate::metadata::RasterMetadata;
use crate::source::RasterSource;
use crate::transport::{RangeRequest, Transport};
use crate::{DemError, Result};
use bytes::Bytes;
use demflood_metrics::metric_defs;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::sync::Arc;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

/// Default size of a cached block.
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024;

/// Blocks fetched up front when opening a file; most headers fit in four.
const HEADER_PREFETCH_BLOCKS: u64 = 4;

/// Maximum fetch-and-retry rounds while parsing the header.
const MAX_HEADER_ATTEMPTS: usize = 32;

/// Maximum fetch-and-retry rounds while decoding a window.
const MAX_DECODE_ATTEMPTS: usize = 4;

/// Window blocks kept after a read when no capacity is given (16 MiB at the
/// default block size).
pub const DEFAULT_CACHE_BLOCKS: usize = 256;

// ============================================================================
// Sparse Block Cache
// ============================================================================

/// Fetched blocks of a remote file.
///
/// Header blocks are pinned for the life of the source. Window blocks live in
/// an LRU that is trimmed back to `capacity` after every window read, so memory
/// stays bounded however much of the raster a session visits.
#[derive(Debug)]
struct SparseBytes {
    pinned: HashMap<u64, Bytes>,
    blocks: LruCache<u64, Bytes>,
    capacity: usize,
    block_size: u64,
    /// File length, once a short response revealed it.
    len: Option<u64>,
    /// First range a reader asked for that was not cached.
    missing: Option<Range<u64>>,
}

impl SparseBytes {
    fn new(block_size: u64, capacity: usize) -> Self {
        Self {
            pinned: HashMap::new(),
            // Trimmed after each window read, never during one
            blocks: LruCache::unbounded(),
            capacity,
            block_size,
            len: None,
            missing: None,
        }
    }

    fn contains(&self, block: u64) -> bool {
        self.pinned.contains_key(&block) || self.blocks.contains(&block)
    }

    /// Look up a block, marking window blocks as recently used.
    fn block(&mut self, block: u64) -> Option<Bytes> {
        match self.pinned.get(&block) {
            Some(data) => Some(data.clone()),
            None => self.blocks.get(&block).cloned(),
        }
    }

    fn cached(&self) -> usize {
        self.pinned.len() + self.blocks.len()
    }

    /// Evict least recently used window blocks down to capacity. Returns the
    /// number evicted.
    fn trim(&mut self) -> usize {
        let mut evicted = 0;
        while self.blocks.len() > self.capacity && self.blocks.pop_lru().is_some() {
            evicted += 1;
        }
        evicted
    }

    /// Block indices covering `range` that are not cached yet.
    fn missing_blocks(&self, range: &Range<u64>) -> Vec<u64> {
        if range.start >= range.end {
            return Vec::new();
        }
        let end = match self.len {
            Some(len) => range.end.min(len),
            None => range.end,
        };
        if range.start >= end {
            return Vec::new();
        }
        let first = range.start / self.block_size;
        let last = (end - 1) / self.block_size;
        (first..=last).filter(|&b| !self.contains(b)).collect()
    }

    /// Store bytes fetched for blocks `first..` starting at the block boundary.
    fn insert(&mut self, first: u64, requested: u64, data: Bytes, pin: bool) {
        let start = first * self.block_size;
        if (data.len() as u64) < requested {
            self.len = Some(start + data.len() as u64);
        }
        let mut block = first;
        let mut rest = data;
        while !rest.is_empty() {
            let take = (self.block_size as usize).min(rest.len());
            let chunk = rest.split_to(take);
            if pin {
                self.blocks.pop(&block);
                self.pinned.insert(block, chunk);
            } else if !self.pinned.contains_key(&block) {
                self.blocks.put(block, chunk);
            }
            block += 1;
        }
    }

    fn record_missing(&mut self, range: Range<u64>) {
        if self.missing.is_none() {
            self.missing = Some(range);
        }
    }
}

/// `Read + Seek` view over the sparse cache, shared with the decoder.
#[derive(Debug, Clone)]
pub struct SparseReader {
    cache: Arc<Mutex<SparseBytes>>,
    pos: u64,
}

impl SparseReader {
    fn new(cache: Arc<Mutex<SparseBytes>>) -> Self {
        Self { cache, pos: 0 }
    }
}

impl Read for SparseReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut cache = self.cache.lock();
        if cache.len.is_some_and(|len| self.pos >= len) {
            return Ok(0);
        }

        let block = self.pos / cache.block_size;
        let offset = (self.pos % cache.block_size) as usize;
        let Some(data) = cache.block(block) else {
            cache.record_missing(self.pos..self.pos + buf.len() as u64);
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("byte {} not fetched yet", self.pos),
            ));
        };
        if offset >= data.len() {
            // Short final block
            return Ok(0);
        }

        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SparseReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => match self.cache.lock().len {
                Some(len) => len.checked_add_signed(delta),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "file length unknown",
                    ))
                }
            },
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        Ok(self.pos)
    }
}

// ============================================================================
// Chunk Layout
// ============================================================================

/// Parsed header of the first image: metadata plus strip/tile locations.
struct ChunkLayout {
    meta: RasterMetadata,
    chunk_width: u32,
    chunk_height: u32,
    chunks_across: u32,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    decoder: Mutex<Decoder<SparseReader>>,
}

impl std::fmt::Debug for ChunkLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkLayout")
            .field("meta", &self.meta)
            .field("chunk_width", &self.chunk_width)
            .field("chunk_height", &self.chunk_height)
            .field("chunks", &self.offsets.len())
            .finish()
    }
}

impl ChunkLayout {
    /// Indices of the chunks overlapping a clipped pixel window.
    fn chunks_overlapping(&self, cols: &Range<u32>, rows: &Range<u32>) -> Vec<u32> {
        let first_x = cols.start / self.chunk_width;
        let last_x = (cols.end - 1) / self.chunk_width;
        let first_y = rows.start / self.chunk_height;
        let last_y = (rows.end - 1) / self.chunk_height;
        (first_y..=last_y)
            .flat_map(|cy| (first_x..=last_x).map(move |cx| cy * self.chunks_across + cx))
            .collect()
    }

    fn byte_range(&self, chunk: u32) -> Result<Range<u64>> {
        let i = chunk as usize;
        match (self.offsets.get(i), self.byte_counts.get(i)) {
            (Some(&offset), Some(&count)) => Ok(offset..offset + count),
            _ => Err(DemError::InvalidGeoTiff(format!(
                "chunk {} outside the {} declared chunks",
                chunk,
                self.offsets.len()
            ))),
        }
    }

    /// Pixel size of a chunk after cropping at the raster edge.
    fn chunk_data_dimensions(&self, chunk: u32) -> (u32, u32) {
        let cx = chunk % self.chunks_across;
        let cy = chunk / self.chunks_across;
        let width = self.chunk_width.min(self.meta.width - cx * self.chunk_width);
        let height = self.chunk_height.min(self.meta.height - cy * self.chunk_height);
        (width, height)
    }
}

fn decoder_limits() -> Limits {
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    limits
}

/// Parse the header from whatever is cached. Misses surface as errors and are
/// recorded in the cache for the caller to fetch.
fn parse_layout(cache: &Arc<Mutex<SparseBytes>>) -> Result<ChunkLayout> {
    let reader = SparseReader::new(Arc::clone(cache));
    let mut decoder = Decoder::new(reader)?.with_limits(decoder_limits());

    let (width, height) = decoder.dimensions()?;
    let no_data = read_nodata_value(&mut decoder);
    let meta = read_georeference(&mut decoder, width, height, no_data)?;

    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    if chunk_width == 0 || chunk_height == 0 {
        return Err(DemError::InvalidGeoTiff("zero-sized strips or tiles".into()));
    }

    let (offsets, byte_counts) = match decoder.find_tag(Tag::TileOffsets)? {
        Some(offsets) => (
            offsets.into_u64_vec()?,
            decoder.get_tag_u64_vec(Tag::TileByteCounts)?,
        ),
        None => (
            decoder.get_tag_u64_vec(Tag::StripOffsets)?,
            decoder.get_tag_u64_vec(Tag::StripByteCounts)?,
        ),
    };

    Ok(ChunkLayout {
        chunks_across: width.div_ceil(chunk_width),
        meta,
        chunk_width,
        chunk_height,
        offsets,
        byte_counts,
        decoder: Mutex::new(decoder),
    })
}

/// Read the geotransform from ModelPixelScale + ModelTiepoint, falling back to
/// ModelTransformation.
fn read_georeference<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
    no_data: Option<f32>,
) -> Result<RasterMetadata> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
    let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 {
            // Tiepoint format: [i, j, k, x, y, z] ties raster (i, j) to model (x, y)
            let origin_lon = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_lat = tiepoint[4] + tiepoint[1] * scale[1];
            return Ok(RasterMetadata::from_origin(
                width, height, origin_lon, origin_lat, scale[0], scale[1], no_data,
            ));
        }
    }

    if let Ok(transform) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if transform.len() >= 8 && transform[1] == 0.0 && transform[4] == 0.0 {
            return Ok(RasterMetadata::from_origin(
                width,
                height,
                transform[3],
                transform[7],
                transform[0],
                transform[5],
                no_data,
            ));
        }
    }

    Err(DemError::InvalidGeoTiff(
        "no usable ModelPixelScale/ModelTiepoint or ModelTransformation".into(),
    ))
}

/// Try to read the no-data value from the GDAL_NODATA tag.
fn read_nodata_value<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|text| text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok())
}

/// Convert decoded samples of any numeric type to `f32`.
fn decode_elevation_data(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    }
}

// ============================================================================
// Source
// ============================================================================

/// A GeoTIFF read through byte-range requests.
pub struct GeoTiffSource<T> {
    url: String,
    transport: T,
    cache: Arc<Mutex<SparseBytes>>,
    layout: OnceCell<ChunkLayout>,
}

impl<T> std::fmt::Debug for GeoTiffSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTiffSource")
            .field("url", &self.url)
            .field("layout", &self.layout.get())
            .finish()
    }
}

impl<T: Transport> GeoTiffSource<T> {
    /// Create a source for `url` with the default block size.
    pub fn new(url: impl Into<String>, transport: T) -> Self {
        Self::with_block_size(url, transport, DEFAULT_BLOCK_SIZE)
    }

    /// Create a source fetching blocks of `block_size` bytes.
    pub fn with_block_size(url: impl Into<String>, transport: T, block_size: u64) -> Self {
        Self {
            url: url.into(),
            transport,
            cache: Arc::new(Mutex::new(SparseBytes::new(
                block_size.max(1),
                DEFAULT_CACHE_BLOCKS,
            ))),
            layout: OnceCell::new(),
        }
    }

    /// Keep at most `blocks` window blocks between reads. Header blocks are
    /// always kept.
    pub fn with_cache_blocks(self, blocks: usize) -> Self {
        self.cache.lock().capacity = blocks;
        self
    }

    /// The raster URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The transport used for range requests.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of blocks currently cached, header blocks included.
    pub fn cached_blocks(&self) -> usize {
        self.cache.lock().cached()
    }

    async fn layout(&self) -> Result<&ChunkLayout> {
        self.layout.get_or_try_init(|| self.open_layout()).await
    }

    async fn open_layout(&self) -> Result<ChunkLayout> {
        debug!("Opening GeoTIFF {}", self.url);
        let prefetch = self.cache.lock().block_size * HEADER_PREFETCH_BLOCKS;
        self.ensure_cached(&[0..prefetch], true).await?;

        for _ in 0..MAX_HEADER_ATTEMPTS {
            let parsed = parse_layout(&self.cache);
            let missing = self.cache.lock().missing.take();
            match (parsed, missing) {
                (_, Some(range)) => {
                    trace!("Header needs bytes {:?}", range);
                    let end = range.end.max(range.start + prefetch);
                    self.ensure_cached(&[range.start..end], true).await?;
                }
                (Ok(layout), None) => {
                    debug!(
                        "GeoTIFF {}x{} with {} chunks of {}x{}",
                        layout.meta.width,
                        layout.meta.height,
                        layout.offsets.len(),
                        layout.chunk_width,
                        layout.chunk_height
                    );
                    return Ok(layout);
                }
                (Err(e), None) => return Err(e),
            }
        }

        Err(DemError::InvalidGeoTiff(format!(
            "header still incomplete after {} fetches",
            MAX_HEADER_ATTEMPTS
        )))
    }

    /// Fetch every uncached block touched by `ranges`, coalescing adjacent
    /// blocks into single requests. Pinned blocks are never evicted.
    async fn ensure_cached(&self, ranges: &[Range<u64>], pin: bool) -> Result<()> {
        let runs = {
            let cache = self.cache.lock();
            let mut blocks: Vec<u64> = ranges.iter().flat_map(|r| cache.missing_blocks(r)).collect();
            blocks.sort_unstable();
            blocks.dedup();
            coalesce(&blocks)
        };

        for run in runs {
            self.fetch_blocks(run, pin).await?;
        }
        Ok(())
    }

    async fn fetch_blocks(&self, blocks: Range<u64>, pin: bool) -> Result<()> {
        let block_size = self.cache.lock().block_size;
        let start = blocks.start * block_size;
        let request = RangeRequest::new(self.url.clone(), start..blocks.end * block_size);

        let response = self.transport.fetch(&request).await?;
        let full_body = response.status == 200;
        let mut data = response.bytes().await?;
        if full_body && data.len() as u64 > request.len() {
            // Server ignored the Range header
            let end = (request.range.end as usize).min(data.len());
            data = data.slice((start as usize).min(end)..end);
        }

        metrics::counter!(metric_defs::FETCH_REQUESTS.name).increment(1);
        metrics::counter!(metric_defs::FETCH_BYTES.name).increment(data.len() as u64);
        trace!("Fetched {} bytes at {}", data.len(), start);

        self.cache.lock().insert(blocks.start, request.len(), data, pin);
        Ok(())
    }

    /// Fetch and decode the chunks a window overlaps.
    async fn fill_window(
        &self,
        layout: &ChunkLayout,
        cols: Range<u32>,
        rows: Range<u32>,
    ) -> Result<Vec<f32>> {
        let meta = &layout.meta;
        let width = cols.end.saturating_sub(cols.start) as usize;
        let height = rows.end.saturating_sub(rows.start) as usize;
        let mut out = vec![meta.no_data.unwrap_or(f32::NAN); width * height];

        let clipped_cols = cols.start.min(meta.width)..cols.end.min(meta.width);
        let clipped_rows = rows.start.min(meta.height)..rows.end.min(meta.height);
        if clipped_cols.is_empty() || clipped_rows.is_empty() {
            return Ok(out);
        }

        let chunks = layout.chunks_overlapping(&clipped_cols, &clipped_rows);
        let ranges = chunks
            .iter()
            .map(|&chunk| layout.byte_range(chunk))
            .collect::<Result<Vec<_>>>()?;
        self.ensure_cached(&ranges, false).await?;

        for _ in 0..MAX_DECODE_ATTEMPTS {
            let missing = self.decode_chunks(
                layout,
                &chunks,
                &cols,
                &rows,
                &clipped_cols,
                &clipped_rows,
                &mut out,
            )?;
            match missing {
                None => return Ok(out),
                Some(range) => self.ensure_cached(&[range], false).await?,
            }
        }

        Err(DemError::InvalidGeoTiff(format!(
            "window {:?}x{:?} still incomplete after {} fetches",
            cols, rows, MAX_DECODE_ATTEMPTS
        )))
    }

    /// Decode the overlapping chunks into `out`. Returns the missing range if
    /// the decoder ran past the cache.
    fn decode_chunks(
        &self,
        layout: &ChunkLayout,
        chunks: &[u32],
        cols: &Range<u32>,
        rows: &Range<u32>,
        clipped_cols: &Range<u32>,
        clipped_rows: &Range<u32>,
        out: &mut [f32],
    ) -> Result<Option<Range<u64>>> {
        let out_width = (cols.end - cols.start) as usize;
        let mut decoder = layout.decoder.lock();

        for &chunk in chunks {
            let decoded = match decoder.read_chunk(chunk) {
                Ok(decoded) => decoded,
                Err(e) => {
                    return match self.cache.lock().missing.take() {
                        Some(range) => Ok(Some(range)),
                        None => Err(e.into()),
                    };
                }
            };
            let data = decode_elevation_data(decoded);
            let (data_width, data_height) = layout.chunk_data_dimensions(chunk);
            let pixels = data_width as usize * data_height as usize;
            if pixels == 0 || data.len() < pixels {
                return Err(DemError::InvalidGeoTiff(format!(
                    "chunk {} decoded to {} samples, expected {}",
                    chunk,
                    data.len(),
                    pixels
                )));
            }
            let samples_per_pixel = data.len() / pixels;

            let chunk_x = (chunk % layout.chunks_across) * layout.chunk_width;
            let chunk_y = (chunk / layout.chunks_across) * layout.chunk_height;
            let x_range = clipped_cols.start.max(chunk_x)..clipped_cols.end.min(chunk_x + data_width);
            let y_range = clipped_rows.start.max(chunk_y)..clipped_rows.end.min(chunk_y + data_height);

            for y in y_range {
                let src_row = (y - chunk_y) as usize * data_width as usize;
                let dst_row = (y - rows.start) as usize * out_width;
                for x in x_range.clone() {
                    let src = (src_row + (x - chunk_x) as usize) * samples_per_pixel;
                    out[dst_row + (x - cols.start) as usize] = data[src];
                }
            }
        }

        Ok(None)
    }
}

fn coalesce(blocks: &[u64]) -> Vec<Range<u64>> {
    let mut runs: Vec<Range<u64>> = Vec::new();
    for &block in blocks {
        match runs.last_mut() {
            Some(run) if run.end == block => run.end += 1,
            _ => runs.push(block..block + 1),
        }
    }
    runs
}

impl<T: Transport> RasterSource for GeoTiffSource<T> {
    async fn open_metadata(&self) -> Result<RasterMetadata> {
        Ok(self.layout().await?.meta.clone())
    }

    async fn read_window(&self, cols: Range<u32>, rows: Range<u32>) -> Result<Vec<f32>> {
        let layout = self.layout().await?;
        let result = self.fill_window(layout, cols, rows).await;
        let evicted = self.cache.lock().trim();
        if evicted > 0 {
            trace!("Evicted {} cached blocks", evicted);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(data: &[u8], block_size: u64) -> Arc<Mutex<SparseBytes>> {
        let mut cache = SparseBytes::new(block_size, 16);
        cache.insert(0, data.len() as u64 + 1, Bytes::copy_from_slice(data), true);
        Arc::new(Mutex::new(cache))
    }

    #[test]
    fn test_coalesce_runs() {
        assert_eq!(coalesce(&[1, 2, 3, 7, 8, 10]), vec![1..4, 7..9, 10..11]);
        assert!(coalesce(&[]).is_empty());
    }

    #[test]
    fn test_missing_blocks() {
        let mut cache = SparseBytes::new(10, 16);
        cache.insert(1, 10, Bytes::from_static(&[0; 10]), false);
        assert_eq!(cache.missing_blocks(&(5..35)), vec![0, 2, 3]);
        assert!(cache.missing_blocks(&(12..18)).is_empty());
        assert!(cache.missing_blocks(&(20..20)).is_empty());
    }

    #[test]
    fn test_short_insert_sets_length() {
        let cache = cache_with(&[1, 2, 3, 4, 5], 4);
        let cache = cache.lock();
        assert_eq!(cache.len, Some(5));
        assert_eq!(cache.cached(), 2);
        assert!(cache.missing_blocks(&(0..100)).is_empty());
    }

    #[test]
    fn test_trim_keeps_pinned_and_recent_blocks() {
        let mut cache = SparseBytes::new(4, 2);
        cache.insert(0, 4, Bytes::from_static(&[0; 4]), true);
        for block in 1..=4 {
            cache.insert(block, 4, Bytes::from_static(&[1; 4]), false);
        }
        assert!(cache.block(1).is_some());

        assert_eq!(cache.trim(), 2);
        assert_eq!(cache.cached(), 3);
        assert!(cache.contains(0));
        assert!(cache.contains(1));
        assert!(cache.contains(4));
        assert!(!cache.contains(2));
        assert!(!cache.contains(3));
        assert_eq!(cache.missing_blocks(&(8..16)), vec![2, 3]);
        assert_eq!(cache.trim(), 0);
    }

    #[test]
    fn test_pinning_replaces_window_block() {
        let mut cache = SparseBytes::new(4, 0);
        cache.insert(3, 4, Bytes::from_static(&[1; 4]), false);
        cache.insert(3, 4, Bytes::from_static(&[2; 4]), true);
        assert_eq!(cache.trim(), 0);
        assert_eq!(cache.block(3).as_deref(), Some(&[2u8; 4][..]));
    }

    #[test]
    fn test_parse_layout_reads_georeference() {
        use tiff::encoder::colortype::Gray32Float;
        use tiff::encoder::TiffEncoder;

        let mut cursor = io::Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let mut image = encoder.new_image::<Gray32Float>(4, 2).unwrap();
            let dir = image.encoder();
            dir.write_tag(Tag::ModelPixelScaleTag, &[0.5, 0.25, 0.0][..]).unwrap();
            dir.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, 10.0, 50.0, 0.0][..])
                .unwrap();
            dir.write_tag(Tag::GdalNodata, "-9999").unwrap();
            image.write_data(&[1.0f32; 8]).unwrap();
        }

        let layout = parse_layout(&cache_with(&cursor.into_inner(), 64)).unwrap();
        let meta = &layout.meta;
        assert_eq!((meta.width, meta.height), (4, 2));
        assert_eq!(meta.pixel_width, 0.5);
        assert_eq!(meta.pixel_height, 0.25);
        assert_eq!(meta.bbox.min_x, 10.0);
        assert_eq!(meta.bbox.max_x, 12.0);
        assert_eq!(meta.bbox.min_y, 49.5);
        assert_eq!(meta.bbox.max_y, 50.0);
        assert_eq!(meta.no_data, Some(-9999.0));
    }

    #[test]
    fn test_reader_spans_blocks() {
        let data: Vec<u8> = (0..20).collect();
        let mut reader = SparseReader::new(cache_with(&data, 8));
        let mut buf = [0u8; 12];
        reader.seek(SeekFrom::Start(4)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, &data[4..16]);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, &data[16..]);
    }

    #[test]
    fn test_reader_records_missing_range() {
        let cache = Arc::new(Mutex::new(SparseBytes::new(8, 16)));
        let mut reader = SparseReader::new(Arc::clone(&cache));
        reader.seek(SeekFrom::Start(20)).unwrap();
        let mut buf = [0u8; 4];
        assert!(reader.read(&mut buf).is_err());
        assert_eq!(cache.lock().missing, Some(20..24));
    }

    #[test]
    fn test_seek_before_start_fails() {
        let mut reader = SparseReader::new(cache_with(&[0; 4], 8));
        assert!(reader.seek(SeekFrom::Current(-1)).is_err());
        assert_eq!(reader.seek(SeekFrom::End(-1)).unwrap(), 3);
    }
}
