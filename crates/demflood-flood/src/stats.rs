//! Overlay entries and the statistics folded across them.

use crate::engine::FloodMask;
use crate::params::FloodParams;
use demflood_dem::TileData;
use std::sync::Arc;

/// Gap kept between a tile's minimum and its display ceiling.
pub const CEILING_EPSILON: f64 = 1e-3;

/// Gap kept between the aggregate minimum and a user ceiling override.
pub const OVERRIDE_EPSILON: f64 = 0.1;

/// Clamp without panicking when `lo > hi`; the lower bound wins.
fn clamp_lo(value: f64, lo: f64, hi: f64) -> f64 {
    lo.max(hi.min(value))
}

/// One rendered cell: its tile, flooded count and display ceiling.
#[derive(Debug, Clone)]
pub struct OverlayEntry {
    /// Elevation data of the cell.
    pub tile: Arc<TileData>,
    /// Flooded cells under the parameters the entry was built with.
    pub flood_count: usize,
    /// Elevation mapped to the top of the colour ramp.
    pub display_ceiling: f64,
    /// Whether the ceiling came from a user override.
    pub is_override: bool,
}

impl OverlayEntry {
    /// Build an entry for `tile` with the given flood mask and override.
    pub fn new(tile: Arc<TileData>, mask: &FloodMask, display_override: Option<f64>) -> Self {
        let display_ceiling = display_ceiling(&tile, display_override);
        Self {
            tile,
            flood_count: mask.count(),
            display_ceiling,
            is_override: display_override.is_some(),
        }
    }

    /// Compute the mask for `tile` and build its entry.
    pub fn render(tile: Arc<TileData>, params: &FloodParams, display_override: Option<f64>) -> Self {
        let mask = params.flood_mask(&tile);
        Self::new(tile, &mask, display_override)
    }
}

/// Per-tile display ceiling: the override (or the tile maximum) clamped to
/// `[min + CEILING_EPSILON, max]`.
pub fn display_ceiling(tile: &TileData, display_override: Option<f64>) -> f64 {
    let min = f64::from(tile.min());
    let max = f64::from(tile.max());
    clamp_lo(display_override.unwrap_or(max), min + CEILING_EPSILON, max)
}

/// Statistics across every selected cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySummary {
    /// Lowest elevation across all tiles.
    pub min: f64,
    /// Highest elevation across all tiles.
    pub max: f64,
    /// Display ceiling after applying the override.
    pub ceiling: f64,
    /// Flooded cells summed over all entries.
    pub flood_cells: usize,
}

impl OverlaySummary {
    /// Fold entries into a summary. Returns `None` without entries.
    pub fn from_entries(entries: &[OverlayEntry], display_override: Option<f64>) -> Option<Self> {
        let first = entries.first()?;
        let mut min = f64::from(first.tile.min());
        let mut max = f64::from(first.tile.max());
        let mut flood_cells = 0;
        for entry in entries {
            min = min.min(f64::from(entry.tile.min()));
            max = max.max(f64::from(entry.tile.max()));
            flood_cells += entry.flood_count;
        }

        let ceiling = match display_override {
            Some(value) => clamp_override(value, min, max),
            None => max,
        };
        Some(Self {
            min,
            max,
            ceiling,
            flood_cells,
        })
    }
}

/// Clamp a ceiling override to `[min(min + OVERRIDE_EPSILON, max), max]`.
pub fn clamp_override(value: f64, min: f64, max: f64) -> f64 {
    clamp_lo(value, (min + OVERRIDE_EPSILON).min(max), max)
}
