//! Benchmarks for the linear nearest-point scan.
//!
//! The lookup walks every charge point, so cost grows with table size.
//! These numbers show where a spatial index would start to pay off.

use std::time::Duration;

use chargemap_core::geo::{haversine_km, nearest};
use chargemap_core::types::ChargePoint;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

/// Spread points over the globe on a deterministic grid.
fn generate_points(count: usize) -> Vec<ChargePoint> {
    (0..count)
        .map(|i| {
            let lat = ((i * 37) % 180) as f64 - 90.0;
            let lng = ((i * 91) % 360) as f64 - 180.0;
            ChargePoint {
                id: Uuid::new_v4(),
                lat,
                lng,
                location: format!("Station {}", i),
            }
        })
        .collect()
}

fn bench_haversine(c: &mut Criterion) {
    c.bench_function("haversine_single", |b| {
        b.iter(|| {
            haversine_km(
                black_box(40.7453297),
                black_box(-73.9929523),
                black_box(-17.0),
                black_box(168.0),
            )
        })
    });
}

fn bench_nearest_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_scan");
    group.measurement_time(Duration::from_secs(5));

    for size in [100usize, 10_000, 100_000] {
        let points = generate_points(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &points, |b, points| {
            b.iter(|| nearest(black_box(points), black_box(40.0), black_box(-70.0)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_haversine, bench_nearest_scan);
criterion_main!(benches);
