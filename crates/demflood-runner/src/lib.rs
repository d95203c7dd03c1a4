//! # demflood-runner
//!
//! Selection session, configuration and reporting for the `demflood` CLI.
//!
//! A [`SelectionSession`] ties the DEM pipeline and the flood engine together:
//! each selected grid cell is read from the raster, flooded with the current
//! parameters and kept as an overlay until the next single selection replaces
//! it (or, in multi-select mode, until the overlays are cleared).

pub mod config;
pub mod error;
pub mod grid;
pub mod report;
pub mod session;

pub use config::{DemfloodConfig, FloodConfig, GridConfig, RegionBounds, SourceConfig};
pub use error::{Result, RunnerError};
pub use grid::{parse_bounds, parse_lat_lon, CellGrid};
pub use report::{SampleReport, SelectionReport, SessionReport};
pub use session::{SelectionOutcome, SelectionSession, StatusKind, StatusMessage};
