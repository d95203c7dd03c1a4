//! Byte-range transports for raster data.
//!
//! A [`Transport`] answers [`RangeRequest`]s with a streamed body. The
//! concrete transports are [`HttpTransport`] (reqwest), [`FileTransport`]
//! (local files) and [`MemoryTransport`] (an in-memory buffer).
//!
//! [`TransportWithProgress`] decorates any transport: responses for the
//! tracked raster URL are drained chunk by chunk into the active
//! [`ProgressMonitor`] and handed back fully buffered, so callers see the same
//! payload they would have seen without the decorator. Other URLs, and all
//! traffic while no tracker is active, pass through untouched.

use crate::progress::ProgressMonitor;
use crate::{DemError, Result};
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::trace;

/// Chunk size used when streaming buffered bodies.
const BUFFERED_CHUNK_SIZE: usize = 64 * 1024;

/// A request for a byte range of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    /// Resource URL (or path for local transports).
    pub url: String,
    /// Half-open byte range.
    pub range: Range<u64>,
}

impl RangeRequest {
    /// Create a range request.
    pub fn new(url: impl Into<String>, range: Range<u64>) -> Self {
        Self {
            url: url.into(),
            range,
        }
    }

    /// Value of the HTTP `Range` header (inclusive end).
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.range.start, self.range.end.saturating_sub(1))
    }

    /// Number of bytes requested.
    pub fn len(&self) -> u64 {
        self.range.end.saturating_sub(self.range.start)
    }

    /// Whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A streamed response body.
pub trait ResponseBody: Send {
    /// Next chunk of the body, or `None` once exhausted.
    fn chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;
}

/// A transport response.
#[derive(Debug)]
pub struct TransportResponse<B> {
    /// HTTP-style status code.
    pub status: u16,
    /// Declared body length, if known.
    pub content_length: Option<u64>,
    /// The body.
    pub body: B,
}

impl<B: ResponseBody> TransportResponse<B> {
    /// Drain the body into one buffer.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::with_capacity(self.content_length.unwrap_or(0) as usize);
        while let Some(chunk) = self.body.chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }
}

/// Source of byte ranges.
pub trait Transport: Send + Sync {
    /// Body type produced by this transport.
    type Body: ResponseBody;

    /// Fetch a byte range.
    fn fetch(
        &self,
        request: &RangeRequest,
    ) -> impl Future<Output = Result<TransportResponse<Self::Body>>> + Send;
}

// ============================================================================
// Buffered Body
// ============================================================================

/// A body held in memory, yielded in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct BufferedBody {
    data: Bytes,
    chunk_size: usize,
}

impl BufferedBody {
    /// Body yielded in [`BUFFERED_CHUNK_SIZE`] chunks.
    pub fn new(data: Bytes) -> Self {
        Self::with_chunk_size(data, BUFFERED_CHUNK_SIZE)
    }

    /// Body yielded in chunks of `chunk_size` bytes.
    pub fn with_chunk_size(data: Bytes, chunk_size: usize) -> Self {
        Self {
            data,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Body yielded as a single chunk.
    pub fn whole(data: Bytes) -> Self {
        Self::with_chunk_size(data, usize::MAX)
    }
}

impl ResponseBody for BufferedBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let take = self.chunk_size.min(self.data.len());
        Ok(Some(self.data.split_to(take)))
    }
}

fn clamp_range(range: &Range<u64>, len: u64) -> Range<u64> {
    let start = range.start.min(len);
    start..range.end.min(len).max(start)
}

// ============================================================================
// HTTP
// ============================================================================

/// Range requests over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// Streaming body of an HTTP response.
#[derive(Debug)]
pub struct HttpBody(reqwest::Response);

impl ResponseBody for HttpBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.0.chunk().await?)
    }
}

impl Transport for HttpTransport {
    type Body = HttpBody;

    async fn fetch(&self, request: &RangeRequest) -> Result<TransportResponse<HttpBody>> {
        trace!("GET {} {}", request.url, request.header_value());
        let response = self
            .client
            .get(&request.url)
            .header(reqwest::header::RANGE, request.header_value())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DemError::HttpStatus {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            content_length: response.content_length(),
            body: HttpBody(response),
        })
    }
}

// ============================================================================
// Local File
// ============================================================================

/// Range reads from local files. `file://` prefixes are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    type Body = BufferedBody;

    async fn fetch(&self, request: &RangeRequest) -> Result<TransportResponse<BufferedBody>> {
        let path = request.url.strip_prefix("file://").unwrap_or(&request.url);
        let mut file = tokio::fs::File::open(Path::new(path)).await?;
        let len = file.metadata().await?.len();
        let range = clamp_range(&request.range, len);

        let mut buffer = vec![0u8; (range.end - range.start) as usize];
        file.seek(SeekFrom::Start(range.start)).await?;
        file.read_exact(&mut buffer).await?;

        Ok(TransportResponse {
            status: 206,
            content_length: Some(buffer.len() as u64),
            body: BufferedBody::new(Bytes::from(buffer)),
        })
    }
}

// ============================================================================
// In-Memory
// ============================================================================

/// Serves ranges of an in-memory buffer for any URL.
#[derive(Debug)]
pub struct MemoryTransport {
    data: Bytes,
    chunk_size: usize,
    requests: AtomicUsize,
}

impl MemoryTransport {
    /// Serve `data`, streaming bodies in [`BUFFERED_CHUNK_SIZE`] chunks.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_chunk_size(data, BUFFERED_CHUNK_SIZE)
    }

    /// Serve `data`, streaming bodies in `chunk_size` chunks.
    pub fn with_chunk_size(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            data: data.into(),
            chunk_size,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of requests served.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Transport for MemoryTransport {
    type Body = BufferedBody;

    async fn fetch(&self, request: &RangeRequest) -> Result<TransportResponse<BufferedBody>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let range = clamp_range(&request.range, self.data.len() as u64);
        let data = self.data.slice(range.start as usize..range.end as usize);
        Ok(TransportResponse {
            status: 206,
            content_length: Some(data.len() as u64),
            body: BufferedBody::with_chunk_size(data, self.chunk_size),
        })
    }
}

impl<T: Transport> Transport for Arc<T> {
    type Body = T::Body;

    fn fetch(
        &self,
        request: &RangeRequest,
    ) -> impl Future<Output = Result<TransportResponse<Self::Body>>> + Send {
        (**self).fetch(request)
    }
}

// ============================================================================
// Progress Instrumentation
// ============================================================================

/// Body of an instrumented transport: either untouched or fully buffered.
#[derive(Debug)]
pub enum ProgressBody<B> {
    /// Untracked response, streamed from the inner transport.
    Passthrough(B),
    /// Tracked response, already received in full.
    Buffered(BufferedBody),
}

impl<B: ResponseBody> ResponseBody for ProgressBody<B> {
    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match self {
            ProgressBody::Passthrough(body) => body.chunk().await,
            ProgressBody::Buffered(body) => body.chunk().await,
        }
    }
}

/// Transport decorator reporting byte progress for one raster URL.
#[derive(Debug)]
pub struct TransportWithProgress<T> {
    inner: T,
    tracked_url: String,
    monitor: Arc<ProgressMonitor>,
}

impl<T: Transport> TransportWithProgress<T> {
    /// Instrument requests whose URL contains `tracked_url`.
    pub fn new(inner: T, tracked_url: impl Into<String>, monitor: Arc<ProgressMonitor>) -> Self {
        Self {
            inner,
            tracked_url: tracked_url.into(),
            monitor,
        }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The progress monitor fed by this transport.
    pub fn monitor(&self) -> &Arc<ProgressMonitor> {
        &self.monitor
    }

    fn is_tracked(&self, request: &RangeRequest) -> bool {
        request.url.contains(&self.tracked_url) && self.monitor.is_tracking()
    }
}

impl<T: Transport> Transport for TransportWithProgress<T> {
    type Body = ProgressBody<T::Body>;

    async fn fetch(&self, request: &RangeRequest) -> Result<TransportResponse<Self::Body>> {
        let response = self.inner.fetch(request).await?;
        if !self.is_tracked(request) {
            return Ok(TransportResponse {
                status: response.status,
                content_length: response.content_length,
                body: ProgressBody::Passthrough(response.body),
            });
        }

        if let Some(len) = response.content_length {
            self.monitor.add_expected(len);
        }

        let TransportResponse {
            status,
            content_length,
            mut body,
        } = response;
        let mut buffer = BytesMut::with_capacity(content_length.unwrap_or(0) as usize);
        while let Some(chunk) = body.chunk().await? {
            self.monitor.add_loaded(chunk.len() as u64);
            buffer.extend_from_slice(&chunk);
        }

        Ok(TransportResponse {
            status,
            content_length,
            body: ProgressBody::Buffered(BufferedBody::whole(buffer.freeze())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::DownloadTracker;

    const URL: &str = "https://example.org/dem/global.tif";

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_range_header() {
        let request = RangeRequest::new(URL, 100..200);
        assert_eq!(request.header_value(), "bytes=100-199");
        assert_eq!(request.len(), 100);
    }

    #[tokio::test]
    async fn test_memory_transport_clamps_range() {
        let transport = MemoryTransport::new(payload(100));
        let response = transport.fetch(&RangeRequest::new(URL, 90..200)).await.unwrap();
        assert_eq!(response.content_length, Some(10));
        assert_eq!(response.bytes().await.unwrap().len(), 10);

        let response = transport.fetch(&RangeRequest::new(URL, 300..400)).await.unwrap();
        assert!(response.bytes().await.unwrap().is_empty());
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_tracked_response_is_buffered_and_counted() {
        let data = payload(10_000);
        let monitor = Arc::new(ProgressMonitor::new());
        let transport = TransportWithProgress::new(
            MemoryTransport::with_chunk_size(data.clone(), 1000),
            "global.tif",
            Arc::clone(&monitor),
        );

        monitor.begin();
        let response = transport.fetch(&RangeRequest::new(URL, 0..4000)).await.unwrap();
        assert!(matches!(response.body, ProgressBody::Buffered(_)));
        assert_eq!(response.status, 206);
        assert_eq!(response.bytes().await.unwrap().as_ref(), &data[..4000]);
        assert_eq!(monitor.tracker(), Some(DownloadTracker { total: 4000, loaded: 4000 }));
        assert_eq!(monitor.progress().percent, 99);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_tracker() {
        let monitor = Arc::new(ProgressMonitor::new());
        let transport = TransportWithProgress::new(
            MemoryTransport::with_chunk_size(payload(8000), 500),
            "global.tif",
            Arc::clone(&monitor),
        );

        monitor.begin();
        let a = RangeRequest::new(URL, 0..2000);
        let b = RangeRequest::new(URL, 2000..6000);
        let (ra, rb) = tokio::join!(transport.fetch(&a), transport.fetch(&b));
        ra.unwrap();
        rb.unwrap();
        assert_eq!(monitor.tracker(), Some(DownloadTracker { total: 6000, loaded: 6000 }));
    }

    #[tokio::test]
    async fn test_untracked_url_passes_through() {
        let monitor = Arc::new(ProgressMonitor::new());
        let transport = TransportWithProgress::new(
            MemoryTransport::new(payload(1000)),
            "global.tif",
            Arc::clone(&monitor),
        );

        monitor.begin();
        let response = transport
            .fetch(&RangeRequest::new("https://tiles.example.org/basemap.png", 0..500))
            .await
            .unwrap();
        assert!(matches!(response.body, ProgressBody::Passthrough(_)));
        assert_eq!(response.bytes().await.unwrap().len(), 500);
        assert_eq!(monitor.tracker(), Some(DownloadTracker::default()));
    }

    #[tokio::test]
    async fn test_idle_monitor_passes_through() {
        let monitor = Arc::new(ProgressMonitor::new());
        let transport = TransportWithProgress::new(
            MemoryTransport::new(payload(1000)),
            "global.tif",
            Arc::clone(&monitor),
        );

        let response = transport.fetch(&RangeRequest::new(URL, 0..500)).await.unwrap();
        assert!(matches!(response.body, ProgressBody::Passthrough(_)));
        assert_eq!(response.bytes().await.unwrap().len(), 500);
        assert_eq!(monitor.tracker(), None);
    }

    #[tokio::test]
    async fn test_file_transport_reads_range() {
        let path = std::env::temp_dir().join(format!("demflood-transport-{}.bin", std::process::id()));
        std::fs::write(&path, payload(3000)).unwrap();

        let request = RangeRequest::new(format!("file://{}", path.display()), 1000..1500);
        let bytes = FileTransport.fetch(&request).await.unwrap().bytes().await.unwrap();
        assert_eq!(bytes.as_ref(), &payload(3000)[1000..1500]);

        std::fs::remove_file(&path).ok();
    }
}
