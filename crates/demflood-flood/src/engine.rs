//! Two-phase seeded flood fill over an elevation tile.
//!
//! Phase 1 partitions the cells at or below the base threshold into
//! 4-connected components with an explicit-stack depth-first search. Only
//! components of at least `min_seed_cells` cells become seeds, which keeps
//! isolated low pixels from acting as rivers.
//!
//! Phase 2 expands the seeds breadth-first to every reachable valid cell at or
//! below the effective level, `max(water_level, base_threshold)`.
//!
//! Both phases index the flat row-major buffer directly; no per-cell
//! allocation happens beyond the visited set, the mask and the work lists.

use demflood_dem::TileData;
use demflood_metrics::metric_defs;
use std::time::Instant;
use tracing::trace;

/// Flooded cells of one tile, aligned with its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodMask {
    cells: Vec<bool>,
    count: usize,
    width: u32,
    height: u32,
}

impl FloodMask {
    /// A mask with no flooded cells.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            cells: vec![false; width as usize * height as usize],
            count: 0,
            width,
            height,
        }
    }

    /// Per-cell flooded flags in row-major order.
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// Number of flooded cells.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the cell at `(row, col)` is flooded. Out of range is dry.
    pub fn is_flooded(&self, row: u32, col: u32) -> bool {
        row < self.height && col < self.width && self.cells[(row * self.width + col) as usize]
    }
}

/// 4-connected neighbours of a flat index.
#[inline]
fn neighbors(index: usize, width: usize, height: usize) -> impl Iterator<Item = usize> {
    let row = index / width;
    let col = index % width;
    let up = (row > 0).then(|| index - width);
    let down = (row + 1 < height).then(|| index + width);
    let left = (col > 0).then(|| index - 1);
    let right = (col + 1 < width).then(|| index + 1);
    [up, down, left, right].into_iter().flatten()
}

/// Compute the flood mask of `tile`.
///
/// A non-finite `water_level` or `base_threshold`, or an empty tile, yields a
/// mask with nothing flooded. No-data and non-finite cells are never flooded.
pub fn compute_flood_mask(
    tile: &TileData,
    water_level: f64,
    base_threshold: f64,
    min_seed_cells: usize,
) -> FloodMask {
    let width = tile.width() as usize;
    let height = tile.height() as usize;
    let total = width * height;
    let mut mask = FloodMask::empty(tile.width(), tile.height());
    if total == 0 || !water_level.is_finite() || !base_threshold.is_finite() {
        return mask;
    }

    let start = Instant::now();
    let values = tile.values();
    let is_low = |index: usize| {
        let value = values[index];
        tile.is_valid(value) && f64::from(value) <= base_threshold
    };

    // Phase 1: seed components
    let mut visited = vec![false; total];
    let mut queue: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut component: Vec<usize> = Vec::new();

    for index in 0..total {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        if !is_low(index) {
            continue;
        }

        component.clear();
        stack.push(index);
        while let Some(current) = stack.pop() {
            component.push(current);
            for neighbor in neighbors(current, width, height) {
                if visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;
                if is_low(neighbor) {
                    stack.push(neighbor);
                }
            }
        }

        if component.len() >= min_seed_cells {
            for &cell in &component {
                mask.cells[cell] = true;
            }
            queue.extend_from_slice(&component);
        }
    }
    let seeds = queue.len();

    // Phase 2: expansion
    let effective_level = water_level.max(base_threshold);
    let mut head = 0;
    while head < queue.len() {
        let current = queue[head];
        head += 1;
        for neighbor in neighbors(current, width, height) {
            if mask.cells[neighbor] {
                continue;
            }
            let value = values[neighbor];
            if tile.is_valid(value) && f64::from(value) <= effective_level {
                mask.cells[neighbor] = true;
                queue.push(neighbor);
            }
        }
    }
    mask.count = queue.len();

    let elapsed = start.elapsed();
    metrics::gauge!(metric_defs::FLOOD_CELLS.name).set(mask.count as f64);
    metrics::histogram!(metric_defs::FLOOD_COMPUTE_TIME.name).record(elapsed.as_micros() as f64);
    trace!(
        "Flood fill {}x{}: {} seed cells, {} flooded at level {:.2} in {:?}",
        width,
        height,
        seeds,
        mask.count,
        effective_level,
        elapsed
    );

    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use demflood_dem::GeoBounds;

    const NO_DATA: f32 = -9999.0;

    fn tile(values: Vec<f32>, width: u32, height: u32) -> TileData {
        let bounds = GeoBounds::new(13.0, 100.0, 13.02, 100.02);
        TileData::from_samples(values, width, height, bounds, Some(NO_DATA)).unwrap()
    }

    /// 4x4 grid: central 2x2 block at 1.0 surrounded by 10.0.
    fn basin() -> TileData {
        #[rustfmt::skip]
        let values = vec![
            10.0, 10.0, 10.0, 10.0,
            10.0,  1.0,  1.0, 10.0,
            10.0,  1.0,  1.0, 10.0,
            10.0, 10.0, 10.0, 10.0,
        ];
        tile(values, 4, 4)
    }

    #[test]
    fn test_seed_only_below_surroundings() {
        let mask = compute_flood_mask(&basin(), 5.0, 3.0, 4);
        assert_eq!(mask.count(), 4);
        assert!(mask.is_flooded(1, 1));
        assert!(mask.is_flooded(2, 2));
        assert!(!mask.is_flooded(0, 0));
    }

    #[test]
    fn test_full_expansion() {
        let mask = compute_flood_mask(&basin(), 12.0, 3.0, 4);
        assert_eq!(mask.count(), 16);
        assert!(mask.cells().iter().all(|&c| c));
    }

    #[test]
    fn test_small_component_is_not_a_seed() {
        for water in [0.0, 5.0, 12.0, 1e6] {
            assert_eq!(compute_flood_mask(&basin(), water, 3.0, 5).count(), 0);
        }
    }

    #[test]
    fn test_non_finite_levels_flood_nothing() {
        assert_eq!(compute_flood_mask(&basin(), f64::NAN, 3.0, 1).count(), 0);
        assert_eq!(compute_flood_mask(&basin(), f64::INFINITY, 3.0, 1).count(), 0);
        assert_eq!(compute_flood_mask(&basin(), 5.0, f64::NAN, 1).count(), 0);
    }

    #[test]
    fn test_water_below_base_keeps_seeds() {
        // Seeds and cells up to the base stay flooded with the water at 0
        #[rustfmt::skip]
        let values = vec![
            1.0, 1.0, 2.5,
            1.0, 1.0, 9.0,
        ];
        let mask = compute_flood_mask(&tile(values, 3, 2), 0.0, 3.0, 4);
        assert_eq!(mask.count(), 5);
        assert!(mask.is_flooded(0, 2));
    }

    #[test]
    fn test_no_data_never_floods() {
        #[rustfmt::skip]
        let values = vec![
            1.0,     1.0, 1.0,
            NO_DATA, 1.0, f32::NAN,
            1.0,     1.0, 1.0,
        ];
        let mask = compute_flood_mask(&tile(values, 3, 3), 100.0, 3.0, 1);
        assert_eq!(mask.count(), 7);
        assert!(!mask.is_flooded(1, 0));
        assert!(!mask.is_flooded(1, 2));
    }

    #[test]
    fn test_no_data_breaks_connectivity() {
        // Two 2-cell components separated by no-data: neither reaches 3 cells
        #[rustfmt::skip]
        let values = vec![
            1.0, 1.0, NO_DATA, 1.0, 1.0,
        ];
        assert_eq!(compute_flood_mask(&tile(values, 5, 1), 50.0, 3.0, 3).count(), 0);
    }

    #[test]
    fn test_diagonal_cells_are_not_connected() {
        #[rustfmt::skip]
        let values = vec![
            1.0, 9.0,
            9.0, 1.0,
        ];
        assert_eq!(compute_flood_mask(&tile(values, 2, 2), 5.0, 3.0, 2).count(), 0);
        assert_eq!(compute_flood_mask(&tile(vec![1.0, 1.0], 2, 1), 5.0, 3.0, 2).count(), 2);
    }

    #[test]
    fn test_is_flooded_out_of_range() {
        let mask = compute_flood_mask(&basin(), 12.0, 3.0, 4);
        assert!(!mask.is_flooded(4, 0));
        assert!(!mask.is_flooded(0, 4));
    }
}
