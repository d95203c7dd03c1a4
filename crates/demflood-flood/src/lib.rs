//! # demflood-flood
//!
//! Flood-connectivity engine for elevation tiles.
//!
//! Water is assumed to originate in river channels: connected low-lying areas
//! at or below a base river level that are large enough to be more than noise.
//! From those seeds it spreads to every 4-connected cell at or below the water
//! level. The result is a static reachability mask, not a hydrological model.
//!
//! ## Example
//!
//! ```
//! use demflood_dem::{GeoBounds, TileData};
//! use demflood_flood::FloodParams;
//!
//! let values = vec![
//!     10.0, 10.0, 10.0, 10.0,
//!     10.0,  1.0,  1.0, 10.0,
//!     10.0,  1.0,  1.0, 10.0,
//!     10.0, 10.0, 10.0, 10.0,
//! ];
//! let bounds = GeoBounds::new(13.0, 100.0, 13.02, 100.02);
//! let tile = TileData::from_samples(values, 4, 4, bounds, None).unwrap();
//!
//! let params = FloodParams::new(12.0, 3.0, 4.0);
//! assert_eq!(params.flood_mask(&tile).count(), 16);
//! ```

mod engine;
mod params;
mod stats;

pub use engine::{compute_flood_mask, FloodMask};
pub use params::{
    normalize_base_level, normalize_min_seed_cells, normalize_water_level, FloodParams,
    DEFAULT_BASE_LEVEL, DEFAULT_MIN_SEED_CELLS, MAX_BASE_LEVEL, MAX_MIN_SEED_CELLS, MIN_BASE_LEVEL,
};
pub use stats::{
    clamp_override, display_ceiling, OverlayEntry, OverlaySummary, CEILING_EPSILON, OVERRIDE_EPSILON,
};
