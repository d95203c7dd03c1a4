//! Serializable run reports.

use crate::error::Result;
use crate::session::{SelectionOutcome, SelectionSession};
use demflood_dem::{GeoBounds, RasterSource};
use demflood_flood::{FloodParams, OverlayEntry, OverlaySummary};
use serde::Serialize;
use std::fmt::Write as _;

/// Elevation and flood figures of one rendered tile.
#[derive(Debug, Clone, Serialize)]
pub struct TileReport {
    /// Tile width in pixels.
    pub width: u32,
    /// Tile height in pixels.
    pub height: u32,
    /// Lowest valid elevation in metres.
    pub min: f32,
    /// Highest valid elevation in metres.
    pub max: f32,
    /// Top of the colour ramp used when the tile was rendered.
    pub display_ceiling: f64,
    /// Cells marked flooded.
    pub flood_cells: usize,
}

impl From<&OverlayEntry> for TileReport {
    fn from(entry: &OverlayEntry) -> Self {
        Self {
            width: entry.tile.width(),
            height: entry.tile.height(),
            min: entry.tile.min(),
            max: entry.tile.max(),
            display_ceiling: entry.display_ceiling,
            flood_cells: entry.flood_count,
        }
    }
}

/// One selection and how it ended.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    /// `[south, west, north, east]` in degrees.
    pub bounds: [f64; 4],
    /// `rendered`, `empty`, `failed` or `cancelled`.
    pub outcome: &'static str,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The overlay the selection produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile: Option<TileReport>,
}

impl SelectionReport {
    /// Record a finished selection. The tile is the newest overlay when the
    /// selection rendered.
    pub fn record<S: RasterSource>(
        session: &SelectionSession<S>,
        bounds: GeoBounds,
        outcome: &SelectionOutcome,
    ) -> Self {
        let (label, error, tile) = match outcome {
            SelectionOutcome::Rendered(_) => (
                "rendered",
                None,
                session.overlays().last().map(TileReport::from),
            ),
            SelectionOutcome::Empty => ("empty", None, None),
            SelectionOutcome::Failed(reason) => ("failed", Some(reason.clone()), None),
            SelectionOutcome::Cancelled => ("cancelled", None, None),
        };
        Self {
            bounds: [bounds.south, bounds.west, bounds.north, bounds.east],
            outcome: label,
            error,
            tile,
        }
    }
}

/// Elevation at a sampled point.
#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Elevation in metres, or `None` outside every overlay or on no-data.
    pub elevation: Option<f32>,
}

/// Flood parameters in effect.
#[derive(Debug, Clone, Serialize)]
pub struct ParamsReport {
    /// Water surface elevation in metres.
    pub water_level: f64,
    /// Elevation at or below which cells may seed a flood.
    pub base_level: f64,
    /// Smallest low-lying component, in cells, that seeds a flood.
    pub min_seed_cells: usize,
}

impl From<FloodParams> for ParamsReport {
    fn from(params: FloodParams) -> Self {
        Self {
            water_level: params.water_level(),
            base_level: params.base_level(),
            min_seed_cells: params.min_seed_cells(),
        }
    }
}

/// Aggregate over all overlays.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    /// Lowest elevation across overlays.
    pub min: f64,
    /// Highest elevation across overlays.
    pub max: f64,
    /// Shared display ceiling.
    pub ceiling: f64,
    /// Flooded cells summed over overlays.
    pub flood_cells: usize,
}

impl From<OverlaySummary> for SummaryReport {
    fn from(summary: OverlaySummary) -> Self {
        Self {
            min: summary.min,
            max: summary.max,
            ceiling: summary.ceiling,
            flood_cells: summary.flood_cells,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// URL or path of the raster.
    pub source: String,
    /// Flood parameters at the end of the run.
    pub params: ParamsReport,
    /// Selections in the order they were made.
    pub selections: Vec<SelectionReport>,
    /// Overlay aggregate, absent when nothing rendered.
    pub summary: Option<SummaryReport>,
    /// Point samples in request order.
    pub samples: Vec<SampleReport>,
    /// Final status line.
    pub status: String,
}

impl SessionReport {
    /// Snapshot the session after a run.
    pub fn new<S: RasterSource>(
        source: impl Into<String>,
        session: &SelectionSession<S>,
        selections: Vec<SelectionReport>,
        samples: Vec<SampleReport>,
    ) -> Self {
        Self {
            source: source.into(),
            params: session.params().into(),
            selections,
            summary: session.summary().map(SummaryReport::from),
            samples,
            status: session.status().text,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Source: {}", self.source);
        let _ = writeln!(
            out,
            "Water level {:.1} m, base river level {:.1} m, min river cells {}",
            self.params.water_level, self.params.base_level, self.params.min_seed_cells
        );

        for (i, selection) in self.selections.iter().enumerate() {
            let [south, west, north, east] = selection.bounds;
            let _ = write!(
                out,
                "Cell {}: lat {:.3}..{:.3}, lon {:.3}..{:.3}: ",
                i + 1,
                south,
                north,
                west,
                east
            );
            match (&selection.tile, &selection.error) {
                (Some(tile), _) => {
                    let _ = writeln!(
                        out,
                        "{}x{} px, {:.1}..{:.1} m, {} flooded cells",
                        tile.width, tile.height, tile.min, tile.max, tile.flood_cells
                    );
                }
                (None, Some(error)) => {
                    let _ = writeln!(out, "{} ({})", selection.outcome, error);
                }
                (None, None) => {
                    let _ = writeln!(out, "{}", selection.outcome);
                }
            }
        }

        match &self.summary {
            Some(summary) => {
                let _ = writeln!(
                    out,
                    "Overall: {:.1}..{:.1} m, display ceiling {:.1} m, {} flooded cells",
                    summary.min, summary.max, summary.ceiling, summary.flood_cells
                );
            }
            None => {
                let _ = writeln!(out, "Overall: no overlays");
            }
        }

        for sample in &self.samples {
            match sample.elevation {
                Some(elevation) => {
                    let _ = writeln!(out, "Sample {:.4}, {:.4}: {:.2} m", sample.lat, sample.lon, elevation);
                }
                None => {
                    let _ = writeln!(out, "Sample {:.4}, {:.4}: n/a", sample.lat, sample.lon);
                }
            }
        }

        let _ = writeln!(out, "Status: {}", self.status);
        out
    }
}
