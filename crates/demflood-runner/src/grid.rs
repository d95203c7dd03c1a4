//! Selection grid and coordinate parsing.

use crate::config::{GridConfig, RegionBounds};
use crate::error::{Result, RunnerError};
use demflood_dem::GeoBounds;

/// Fixed-step grid of selectable cells over a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGrid {
    step: f64,
    region: RegionBounds,
}

impl CellGrid {
    /// Create a grid with `step` degree cells over `region`.
    pub fn new(step: f64, region: RegionBounds) -> Self {
        Self { step, region }
    }

    /// Create a grid from configuration.
    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.step_deg, config.bounds)
    }

    /// Cell size in degrees.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Region cells are clamped to.
    pub fn region(&self) -> RegionBounds {
        self.region
    }

    /// Snap a coordinate down to the grid.
    pub fn align(&self, value: f64) -> f64 {
        (value / self.step).floor() * self.step
    }

    /// The cell containing a point, clamped to the region.
    pub fn cell_at(&self, lat: f64, lon: f64) -> GeoBounds {
        let south = self.align(lat);
        let west = self.align(lon);
        let r = &self.region;
        GeoBounds::new(
            south.clamp(r.south, r.north),
            west.clamp(r.west, r.east),
            (south + self.step).clamp(r.south, r.north),
            (west + self.step).clamp(r.west, r.east),
        )
    }

    /// Clamp a point into the region.
    pub fn clamp_point(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            lat.clamp(self.region.south, self.region.north),
            lon.clamp(self.region.west, self.region.east),
        )
    }
}

impl Default for CellGrid {
    fn default() -> Self {
        Self::from_config(&GridConfig::default())
    }
}

fn parse_numbers(input: &str, count: usize) -> Result<Vec<f64>> {
    let invalid = |reason: &str| RunnerError::InvalidSelection {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let values = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().map_err(|_| invalid("not a number")))
        .collect::<Result<Vec<_>>>()?;

    if values.len() != count {
        return Err(invalid(&format!("expected {} values, got {}", count, values.len())));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(invalid("values must be finite"));
    }
    Ok(values)
}

/// Parse `"lat,lon"` (comma or whitespace separated).
pub fn parse_lat_lon(input: &str) -> Result<(f64, f64)> {
    let values = parse_numbers(input, 2)?;
    Ok((values[0], values[1]))
}

/// Parse `"south,west,north,east"`.
pub fn parse_bounds(input: &str) -> Result<GeoBounds> {
    let v = parse_numbers(input, 4)?;
    if v[0] > v[2] || v[1] > v[3] {
        return Err(RunnerError::InvalidSelection {
            input: input.to_string(),
            reason: "south/west must not exceed north/east".into(),
        });
    }
    Ok(GeoBounds::new(v[0], v[1], v[2], v[3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cell_at_aligns_to_step() {
        let grid = CellGrid::default();
        let cell = grid.cell_at(13.7563, 100.5018);
        assert_relative_eq!(cell.south, 13.74, epsilon = 1e-9);
        assert_relative_eq!(cell.north, 13.76, epsilon = 1e-9);
        assert_relative_eq!(cell.west, 100.50, epsilon = 1e-9);
        assert_relative_eq!(cell.east, 100.52, epsilon = 1e-9);
        assert!(cell.contains(13.7563, 100.5018));
    }

    #[test]
    fn test_cell_clamped_to_region() {
        let grid = CellGrid::default();
        let cell = grid.cell_at(21.499, 106.499);
        assert!(cell.north <= 21.5);
        assert!(cell.east <= 106.5);

        let outside = grid.cell_at(40.0, 10.0);
        assert_eq!(outside.south, 21.5);
        assert_eq!(outside.north, 21.5);
        assert_eq!(outside.west, 96.8);
    }

    #[test]
    fn test_parse_lat_lon() {
        assert_eq!(parse_lat_lon("13.75, 100.5").unwrap(), (13.75, 100.5));
        assert_eq!(parse_lat_lon("-1 2").unwrap(), (-1.0, 2.0));
        assert!(parse_lat_lon("13.75").is_err());
        assert!(parse_lat_lon("north,east").is_err());
        assert!(parse_lat_lon("nan,1").is_err());
    }

    #[test]
    fn test_parse_bounds() {
        let bounds = parse_bounds("13.7,100.5,13.72,100.52").unwrap();
        assert_eq!(bounds, GeoBounds::new(13.7, 100.5, 13.72, 100.52));
        assert!(parse_bounds("13.72,100.5,13.7,100.52").is_err());
        assert!(parse_bounds("1,2,3").is_err());
    }
}
