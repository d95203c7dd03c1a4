//! YAML configuration.
//!
//! Every field has a default, so an empty file (or no file) yields a working
//! configuration pointed at the global 30 m terrain model over Thailand.
//!
//! ```yaml
//! source:
//!   url: https://example.com/dem.tif
//!   request_timeout_secs: 30
//!   cache_blocks: 256
//! grid:
//!   step_deg: 0.02
//! flood:
//!   base_level: 3.0
//!   min_seed_cells: 30
//! ```

use crate::error::{Result, RunnerError};
use demflood_dem::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS, MAX_CHUNK_ROWS};
use demflood_flood::{FloodParams, DEFAULT_BASE_LEVEL, DEFAULT_MIN_SEED_CELLS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default raster: the global 30 m digital terrain model.
pub const DEFAULT_SOURCE_URL: &str =
    "https://s3.opengeohub.org/global/dtm/v1.2/gedtm_rf_m_30m_s_20060101_20151231_go_epsg.4326.3855_v1.2.tif";

/// Default selection grid spacing in degrees.
pub const DEFAULT_GRID_STEP_DEG: f64 = 0.02;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DemfloodConfig {
    /// Where and how to read the raster.
    pub source: SourceConfig,
    /// Selection grid.
    pub grid: GridConfig,
    /// Initial flood parameters.
    pub flood: FloodConfig,
}

/// Raster source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SourceConfig {
    /// HTTP(S) URL or local path of the GeoTIFF.
    pub url: String,
    /// Bytes per cached block and minimum range request size.
    pub block_size: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Upper bound on rows per window chunk.
    pub max_chunk_rows: u32,
    /// Window blocks kept in memory between reads.
    pub cache_blocks: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            block_size: DEFAULT_BLOCK_SIZE,
            request_timeout_secs: 30,
            max_chunk_rows: MAX_CHUNK_ROWS,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
        }
    }
}

impl SourceConfig {
    /// Per-request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether the source is fetched over HTTP rather than read from disk.
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// Geographic region selections are confined to, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionBounds {
    /// South edge (latitude).
    pub south: f64,
    /// West edge (longitude).
    pub west: f64,
    /// North edge (latitude).
    pub north: f64,
    /// East edge (longitude).
    pub east: f64,
}

impl RegionBounds {
    /// Thailand.
    pub const THAILAND: RegionBounds = RegionBounds {
        south: 4.5,
        west: 96.8,
        north: 21.5,
        east: 106.5,
    };
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self::THAILAND
    }
}

/// Selection grid settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GridConfig {
    /// Cell size in degrees.
    pub step_deg: f64,
    /// Region cells are clamped to.
    pub bounds: RegionBounds,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            step_deg: DEFAULT_GRID_STEP_DEG,
            bounds: RegionBounds::default(),
        }
    }
}

/// Initial flood parameters. Values are normalized when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FloodConfig {
    /// Water level in metres; `None` starts at the base level.
    pub water_level: Option<f64>,
    /// Base river level in metres.
    pub base_level: f64,
    /// Minimum cells of a river seed component.
    pub min_seed_cells: f64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            water_level: None,
            base_level: DEFAULT_BASE_LEVEL,
            min_seed_cells: DEFAULT_MIN_SEED_CELLS as f64,
        }
    }
}

impl FloodConfig {
    /// Normalized engine parameters.
    pub fn params(&self) -> FloodParams {
        FloodParams::new(
            self.water_level.unwrap_or(self.base_level),
            self.base_level,
            self.min_seed_cells,
        )
    }
}

impl DemfloodConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not an empty mapping
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RunnerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check values the rest of the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(RunnerError::InvalidConfig("source.url is empty".into()));
        }
        if self.source.block_size == 0 {
            return Err(RunnerError::InvalidConfig("source.block_size must be positive".into()));
        }
        if self.source.max_chunk_rows == 0 {
            return Err(RunnerError::InvalidConfig(
                "source.max_chunk_rows must be positive".into(),
            ));
        }
        if !(self.grid.step_deg.is_finite() && self.grid.step_deg > 0.0) {
            return Err(RunnerError::InvalidConfig(format!(
                "grid.step_deg must be positive, got {}",
                self.grid.step_deg
            )));
        }
        let bounds = &self.grid.bounds;
        if !(bounds.south < bounds.north && bounds.west < bounds.east) {
            return Err(RunnerError::InvalidConfig(format!(
                "grid.bounds are empty: {:?}",
                bounds
            )));
        }
        Ok(())
    }
}
