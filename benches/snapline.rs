use criterion::{Criterion, criterion_group, criterion_main};
use snapline::{
    polyline::{RoutePolylines, SearchHint},
    prelude::*,
    snap::SnapHints,
};
use std::{hint::black_box, time::Duration};

const POINTS: usize = 5_000;

/// A long wiggly route, roughly 5 km of vertices every meter or so.
fn long_polyline() -> Polyline {
    (0..POINTS)
        .map(|i| {
            let step = i as f64 * 0.00001;
            Coordinate::new(37.0 + step, 127.0 + (step * 400.0).sin() * 0.0002)
        })
        .collect()
}

fn full_scan(polyline: &Polyline, probe: &Coordinate) {
    let _ = black_box(polyline.nearest_point(probe, None));
}

fn windowed_scan(polyline: &Polyline, probe: &Coordinate, index: usize) {
    let _ = black_box(polyline.nearest_point(probe, Some(SearchHint::new(index, 30))));
}

fn criterion_benchmark(c: &mut Criterion) {
    let polyline = long_polyline();
    let index = POINTS * 3 / 4;
    let probe = Coordinate::new(polyline[index].latitude, polyline[index].longitude + 0.0001);
    let polylines = RoutePolylines {
        outbound: polyline.clone(),
        inbound: polyline.iter().rev().copied().collect(),
    };
    let engine = SnapEngine::new(SnapConfig::default());
    let hints = SnapHints {
        outbound: Some(index),
        inbound: Some(POINTS - 2 - index),
    };

    let mut group = c.benchmark_group("Snapping");

    group.warm_up_time(Duration::from_secs(3));

    group.measurement_time(Duration::from_secs(10));

    group.bench_function("Full scan", |b| b.iter(|| full_scan(&polyline, &probe)));

    group.bench_function("Windowed scan", |b| {
        b.iter(|| windowed_scan(&polyline, &probe, index))
    });

    group.bench_function("Snap both directions", |b| {
        b.iter(|| black_box(engine.snap(&probe, None, &polylines, hints)))
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
