//! Benchmarks for the flood-connectivity engine.
//!
//! ## Running the benchmarks
//!
//! ```bash
//! cargo bench -p demflood-flood
//! ```
//!
//! ## Benchmarks included
//!
//! - `flood_fill/N` - Seeded flood fill of an NxN synthetic tile

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use demflood_dem::{GeoBounds, TileData};
use demflood_flood::compute_flood_mask;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn terrain(size: u32) -> TileData {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let values = (0..size * size)
        .map(|i| {
            let x = (i % size) as f32 / size as f32;
            let y = (i / size) as f32 / size as f32;
            ((x * 5.0).sin() * 0.2 + 0.5 - y).abs() * 30.0 + rng.gen_range(-1.0..1.0)
        })
        .collect();
    let bounds = GeoBounds::new(13.0, 100.0, 13.02, 100.02);
    TileData::from_samples(values, size, size, bounds, None).expect("terrain has data")
}

fn bench_flood_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("flood_fill");

    for size in [64u32, 256, 1024].iter() {
        let tile = terrain(*size);
        group.throughput(Throughput::Elements(u64::from(size * size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tile, |b, tile| {
            b.iter(|| compute_flood_mask(black_box(tile), black_box(8.0), 3.0, 30))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flood_fill);
criterion_main!(benches);
