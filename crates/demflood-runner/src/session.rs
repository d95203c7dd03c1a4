//! Selection session: the context object behind every cell selection.
//!
//! A [`SelectionSession`] owns everything a selection touches: the metadata
//! resolver, the request generation counter, the progress monitor, the
//! rendered overlays with their flood parameters, and the status line.
//!
//! Selections may overlap. Each one advances the generation and checks its
//! snapshot after every suspension point; a superseded selection returns
//! [`SelectionOutcome::Cancelled`] without touching overlays, progress or
//! status, so only the newest selection's results are ever applied.

use demflood_dem::{
    ChunkedWindowReader, GeoBounds, MetadataResolver, ProgressMonitor, RasterMetadata, RasterSource,
    ReadOutcome, RequestGeneration, TileData,
};
use demflood_flood::{clamp_override, FloodParams, OverlayEntry, OverlaySummary};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Status shown before the first selection.
pub const IDLE_STATUS: &str = "Click a grid cell to stream DEM data.";

/// How long a status line should stay visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Informational; may be hidden after a short delay.
    Transient,
    /// Stays until replaced.
    Persistent,
}

/// A status line for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    /// Message text.
    pub text: String,
    /// Display duration class.
    pub kind: StatusKind,
}

impl StatusMessage {
    /// Create a transient message.
    pub fn transient(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Transient,
        }
    }

    /// Create a persistent message.
    pub fn persistent(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Persistent,
        }
    }
}

/// What a selection ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// A tile was read and added to the overlays.
    Rendered(OverlaySummary),
    /// The window held no valid elevation.
    Empty,
    /// The source or the read failed.
    Failed(String),
    /// A newer selection superseded this one.
    Cancelled,
}

#[derive(Debug, Default)]
struct SessionState {
    overlays: Vec<OverlayEntry>,
    params: FloodParams,
    multi_select: bool,
    display_override: Option<f64>,
    current_tile: Option<Arc<TileData>>,
}

impl SessionState {
    fn rerender(&mut self) {
        let params = self.params;
        let display_override = self.display_override;
        for entry in &mut self.overlays {
            *entry = OverlayEntry::render(Arc::clone(&entry.tile), &params, display_override);
        }
    }

    fn summary(&self) -> Option<OverlaySummary> {
        OverlaySummary::from_entries(&self.overlays, self.display_override)
    }

    fn clear(&mut self) {
        self.overlays.clear();
        self.display_override = None;
        self.current_tile = None;
    }
}

/// Format a water level like `3.0 m`.
fn format_level(value: f64) -> String {
    format!("{:.1} m", value)
}

/// Interactive selection state over one raster source.
#[derive(Debug)]
pub struct SelectionSession<S> {
    resolver: MetadataResolver<S>,
    reader: ChunkedWindowReader,
    generation: RequestGeneration,
    progress: Arc<ProgressMonitor>,
    state: Mutex<SessionState>,
    status: watch::Sender<StatusMessage>,
}

impl<S: RasterSource> SelectionSession<S> {
    /// Create a session over `source`.
    ///
    /// `progress` should be the monitor the source's transport reports bytes
    /// to, so byte and row progress land on the same indicator.
    pub fn new(source: S, progress: Arc<ProgressMonitor>) -> Self {
        let (status, _) = watch::channel(StatusMessage::persistent(IDLE_STATUS));
        Self {
            resolver: MetadataResolver::new(source),
            reader: ChunkedWindowReader::new().with_progress(Arc::clone(&progress)),
            generation: RequestGeneration::new(),
            progress,
            state: Mutex::new(SessionState::default()),
            status,
        }
    }

    /// Set the maximum rows per window chunk.
    pub fn with_max_chunk_rows(mut self, rows: u32) -> Self {
        self.reader = self.reader.with_max_chunk_rows(rows);
        self
    }

    /// Start from the given flood parameters.
    pub fn with_params(self, params: FloodParams) -> Self {
        self.state.lock().params = params;
        self
    }

    /// The raster source.
    pub fn source(&self) -> &S {
        self.resolver.source()
    }

    /// Raster metadata, once a selection has resolved it.
    pub fn metadata(&self) -> Option<&RasterMetadata> {
        self.resolver.cached()
    }

    /// The progress monitor.
    pub fn progress(&self) -> &Arc<ProgressMonitor> {
        &self.progress
    }

    /// The request generation counter.
    pub fn generation(&self) -> &RequestGeneration {
        &self.generation
    }

    /// Subscribe to status updates.
    pub fn subscribe_status(&self) -> watch::Receiver<StatusMessage> {
        self.status.subscribe()
    }

    /// The latest status message.
    pub fn status(&self) -> StatusMessage {
        self.status.borrow().clone()
    }

    fn set_status(&self, message: StatusMessage) {
        debug!("Status: {}", message.text);
        self.status.send_replace(message);
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Read, flood and render the cell covering `bounds`.
    ///
    /// Supersedes any selection still in flight.
    pub async fn select(&self, bounds: GeoBounds) -> SelectionOutcome {
        let generation = self.generation.advance();
        info!(
            "Selection {}: lat {:.4}..{:.4}, lon {:.4}..{:.4}",
            generation.id(),
            bounds.south,
            bounds.north,
            bounds.west,
            bounds.east
        );
        self.set_status(StatusMessage::persistent("Fetching DEM for selected cell…"));
        self.progress.begin();

        let read = match self.resolver.resolve().await {
            Ok(meta) if generation.is_current() => {
                self.reader
                    .read(self.resolver.source(), meta, bounds, &generation)
                    .await
            }
            Ok(_) => Ok(ReadOutcome::Cancelled),
            Err(e) => Err(e),
        };

        if generation.is_stale() {
            debug!("Selection {} superseded", generation.id());
            return SelectionOutcome::Cancelled;
        }

        match read {
            Ok(ReadOutcome::Tile(tile)) => {
                let summary = self.apply_tile(tile);
                self.set_status(StatusMessage::transient("DEM tile ready."));
                self.progress.finish();
                match summary {
                    Some(summary) => SelectionOutcome::Rendered(summary),
                    None => SelectionOutcome::Empty,
                }
            }
            Ok(ReadOutcome::Empty) => {
                self.set_status(StatusMessage::persistent("No data in this cell."));
                self.progress.cancel();
                SelectionOutcome::Empty
            }
            Ok(ReadOutcome::Cancelled) => SelectionOutcome::Cancelled,
            Err(e) => {
                warn!("Failed to render cell: {}", e);
                self.set_status(StatusMessage::persistent(format!(
                    "Failed to render DEM tile: {}",
                    e
                )));
                self.progress.cancel();
                SelectionOutcome::Failed(e.to_string())
            }
        }
    }

    fn apply_tile(&self, tile: TileData) -> Option<OverlaySummary> {
        let mut state = self.state.lock();
        if !state.multi_select {
            state.overlays.clear();
            state.display_override = None;
        }

        let tile = Arc::new(tile);
        let entry = OverlayEntry::render(Arc::clone(&tile), &state.params, state.display_override);
        debug!(
            "Tile {}x{} range {:.1}..{:.1}, {} flooded cells",
            tile.width(),
            tile.height(),
            tile.min(),
            tile.max(),
            entry.flood_count
        );
        state.overlays.push(entry);
        state.current_tile = Some(tile);
        state.summary()
    }

    /// Elevation of the most recent tile at a point.
    pub fn sample(&self, lat: f64, lon: f64) -> Option<f32> {
        let state = self.state.lock();
        let tile = state.current_tile.as_ref()?;
        let value = tile.sample(lat, lon);
        if value.is_none() {
            self.set_status(StatusMessage::transient("Click inside highlighted cell to sample."));
        }
        value
    }

    // ========================================================================
    // Display Parameters
    // ========================================================================

    /// Current flood parameters.
    pub fn params(&self) -> FloodParams {
        self.state.lock().params
    }

    /// Rendered overlays, oldest first.
    pub fn overlays(&self) -> Vec<OverlayEntry> {
        self.state.lock().overlays.clone()
    }

    /// Statistics across all overlays, or `None` without overlays.
    pub fn summary(&self) -> Option<OverlaySummary> {
        self.state.lock().summary()
    }

    /// Current display ceiling override.
    pub fn display_override(&self) -> Option<f64> {
        self.state.lock().display_override
    }

    /// Whether multi-select is on.
    pub fn multi_select(&self) -> bool {
        self.state.lock().multi_select
    }

    /// Set the water level and re-render. Returns the normalized level.
    pub fn set_water_level(&self, value: f64) -> f64 {
        let level = {
            let mut state = self.state.lock();
            let level = state.params.set_water_level(value);
            state.rerender();
            level
        };
        self.set_status(StatusMessage::transient(format!(
            "Water height set to {}",
            format_level(level)
        )));
        level
    }

    /// Set the base river level and re-render. Returns the normalized level.
    pub fn set_base_level(&self, value: f64) -> f64 {
        let level = {
            let mut state = self.state.lock();
            let level = state.params.set_base_level(value);
            state.rerender();
            level
        };
        self.set_status(StatusMessage::transient(format!(
            "Base river level set to {}",
            format_level(level)
        )));
        level
    }

    /// Set the minimum seed component size and re-render. Returns the
    /// normalized size.
    pub fn set_min_seed_cells(&self, value: f64) -> usize {
        let cells = {
            let mut state = self.state.lock();
            let cells = state.params.set_min_seed_cells(value);
            state.rerender();
            cells
        };
        self.set_status(StatusMessage::transient(format!("Min river cells set to {}", cells)));
        cells
    }

    /// Override the display ceiling. Ignored without overlays.
    ///
    /// Returns the clamped override that was applied.
    pub fn set_display_override(&self, value: f64) -> Option<f64> {
        let applied = {
            let mut state = self.state.lock();
            let summary = state.summary()?;
            let applied = clamp_override(value, summary.min, summary.max);
            state.display_override = Some(applied);
            state.rerender();
            applied
        };
        self.set_status(StatusMessage::transient(format!(
            "Max slider set to {} m",
            applied.round()
        )));
        Some(applied)
    }

    /// Drop the display ceiling override.
    pub fn clear_display_override(&self) {
        let mut state = self.state.lock();
        state.display_override = None;
        state.rerender();
    }

    /// Turn multi-select on or off. Turning it off clears the overlays.
    pub fn set_multi_select(&self, enabled: bool) {
        {
            let mut state = self.state.lock();
            state.multi_select = enabled;
            if !enabled {
                state.clear();
            }
        }
        self.set_status(StatusMessage::transient(if enabled {
            "Multi-select enabled. Click multiple cells to compare."
        } else {
            "Multi-select disabled. Previous overlays cleared."
        }));
    }

    /// Remove every overlay and the display override.
    pub fn clear(&self) {
        self.state.lock().clear();
    }
}
