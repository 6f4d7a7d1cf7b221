//! Pathfinding benchmarks for hearth_core.
//!
//! Run with: `cargo bench -p hearth_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hearth_core::pathfinding::{find_path, PathParams};
use hearth_test_utils::fixtures::{cluttered_grid, vec2};

/// A* across cluttered maps of increasing size.
pub fn pathfinding_benchmark(c: &mut Criterion) {
    let params = PathParams::default();
    let mut group = c.benchmark_group("find_path");
    for size in [32u32, 64, 128] {
        let grid = cluttered_grid(size, size, 42);
        let edge = (size * 16 - 8) as i32;
        group.bench_with_input(BenchmarkId::new("corner_to_corner", size), &grid, |b, grid| {
            b.iter(|| find_path(black_box(grid), vec2(8, 8), vec2(edge, edge), &params));
        });
    }
    group.finish();
}

criterion_group!(benches, pathfinding_benchmark);
criterion_main!(benches);
