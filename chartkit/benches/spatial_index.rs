use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chartkit::feature::encode_chart;
use chartkit::{Attributes, Bounds, Coordinate, Feature, FeatureType, IndexKind};

const SIZES: [usize; 3] = [1_000, 10_000, 50_000];

/// Soundings scattered over a 10 x 10 degree square, same positions every run.
fn soundings(count: usize) -> Vec<Feature> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };

    (0..count as u64)
        .map(|id| {
            let coord = Coordinate::new(40.0 + next() * 10.0, -75.0 + next() * 10.0);
            Feature::new(id + 1, FeatureType::Sounding, vec![coord], Attributes::new()).unwrap()
        })
        .collect()
}

/// A 0.5 degree viewport in the middle of the data.
fn viewport() -> Bounds {
    Bounds::new(45.25, 44.75, -69.75, -70.25)
}

fn bench_query_bounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_bounds");
    for size in SIZES {
        for kind in [IndexKind::Linear, IndexKind::Tree] {
            let index = kind.build(soundings(size));
            group.bench_with_input(BenchmarkId::new(kind.as_str(), size), &viewport(), |b, q| {
                b.iter(|| black_box(index.query_bounds(black_box(q)).len()));
            });
        }
    }
    group.finish();
}

fn bench_query_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_point");
    for size in SIZES {
        for kind in [IndexKind::Linear, IndexKind::Tree] {
            let index = kind.build(soundings(size));
            group.bench_function(BenchmarkId::new(kind.as_str(), size), |b| {
                b.iter(|| {
                    black_box(
                        index
                            .query_point(black_box(45.0), black_box(-70.0), 0.01)
                            .len(),
                    )
                });
            });
        }
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in SIZES {
        let features = soundings(size);
        for kind in [IndexKind::Linear, IndexKind::Tree] {
            group.bench_with_input(BenchmarkId::new(kind.as_str(), size), &features, |b, f| {
                b.iter(|| black_box(kind.build(f.clone()).len()));
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let bytes = encode_chart(&soundings(10_000)).unwrap();
    c.bench_function("decode_chart_10000", |b| {
        b.iter(|| black_box(chartkit::feature::decode_chart(black_box(&bytes)).features.len()));
    });
}

criterion_group!(
    benches,
    bench_query_bounds,
    bench_query_point,
    bench_build,
    bench_decode,
);
criterion_main!(benches);
