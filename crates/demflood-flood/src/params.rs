//! Flood parameters and their normalization.

use crate::engine::{compute_flood_mask, FloodMask};
use demflood_dem::TileData;

/// Default base river level in metres.
pub const DEFAULT_BASE_LEVEL: f64 = 3.0;
/// Lowest accepted base river level.
pub const MIN_BASE_LEVEL: f64 = 0.0;
/// Highest accepted base river level.
pub const MAX_BASE_LEVEL: f64 = 20.0;
/// Default minimum seed component size.
pub const DEFAULT_MIN_SEED_CELLS: usize = 30;
/// Largest accepted minimum seed component size.
pub const MAX_MIN_SEED_CELLS: usize = 5000;

/// Normalize a base river level: non-finite falls back to the default,
/// anything else is clamped to `[MIN_BASE_LEVEL, MAX_BASE_LEVEL]`.
pub fn normalize_base_level(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_BASE_LEVEL, MAX_BASE_LEVEL)
    } else {
        DEFAULT_BASE_LEVEL
    }
}

/// Normalize a minimum seed size: non-finite falls back to the default,
/// anything else is rounded and clamped to `[1, MAX_MIN_SEED_CELLS]`.
pub fn normalize_min_seed_cells(value: f64) -> usize {
    if value.is_finite() {
        value.round().clamp(1.0, MAX_MIN_SEED_CELLS as f64) as usize
    } else {
        DEFAULT_MIN_SEED_CELLS
    }
}

/// Normalize a water level against the base: never below it, and the base
/// itself when the input is non-finite.
pub fn normalize_water_level(value: f64, base_level: f64) -> f64 {
    if value.is_finite() {
        value.max(base_level)
    } else {
        base_level
    }
}

/// The three inputs of the flood engine, kept consistent with each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloodParams {
    water_level: f64,
    base_level: f64,
    min_seed_cells: usize,
}

impl Default for FloodParams {
    fn default() -> Self {
        Self {
            water_level: DEFAULT_BASE_LEVEL,
            base_level: DEFAULT_BASE_LEVEL,
            min_seed_cells: DEFAULT_MIN_SEED_CELLS,
        }
    }
}

impl FloodParams {
    /// Build normalized parameters.
    pub fn new(water_level: f64, base_level: f64, min_seed_cells: f64) -> Self {
        let mut params = Self::default();
        params.set_base_level(base_level);
        params.set_water_level(water_level);
        params.set_min_seed_cells(min_seed_cells);
        params
    }

    /// Current water level.
    pub fn water_level(&self) -> f64 {
        self.water_level
    }

    /// Current base river level.
    pub fn base_level(&self) -> f64 {
        self.base_level
    }

    /// Current minimum seed component size.
    pub fn min_seed_cells(&self) -> usize {
        self.min_seed_cells
    }

    /// Set the water level. Returns the normalized value.
    pub fn set_water_level(&mut self, value: f64) -> f64 {
        self.water_level = normalize_water_level(value, self.base_level);
        self.water_level
    }

    /// Set the base river level, raising the water level to it if needed.
    /// Returns the normalized value.
    pub fn set_base_level(&mut self, value: f64) -> f64 {
        self.base_level = normalize_base_level(value);
        if self.water_level < self.base_level {
            self.water_level = self.base_level;
        }
        self.base_level
    }

    /// Set the minimum seed component size. Returns the normalized value.
    pub fn set_min_seed_cells(&mut self, value: f64) -> usize {
        self.min_seed_cells = normalize_min_seed_cells(value);
        self.min_seed_cells
    }

    /// Compute the flood mask of `tile` with these parameters.
    pub fn flood_mask(&self, tile: &TileData) -> FloodMask {
        compute_flood_mask(tile, self.water_level, self.base_level, self.min_seed_cells)
    }
}
