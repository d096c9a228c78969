use snapline::{
    polyline::{SearchHint, split_by_turn_index},
    prelude::*,
};

fn zigzag(count: usize) -> Polyline {
    (0..count)
        .map(|i| Coordinate::new(37.0 + i as f64 * 0.001, 127.0 + (i % 2) as f64 * 0.001))
        .collect()
}

fn probes() -> Vec<Coordinate> {
    (0..25)
        .map(|i| {
            Coordinate::new(
                37.0003 + i as f64 * 0.0013,
                126.9995 + (i % 5) as f64 * 0.0004,
            )
        })
        .collect()
}

#[test]
fn projection_is_never_further_than_any_vertex() {
    let polyline = zigzag(30);
    for probe in probes() {
        let projection = polyline.nearest_point(&probe, None);
        assert!(!projection.degenerate);
        for vertex in polyline.points() {
            let to_vertex = probe.approx_distance(vertex).as_meters();
            assert!(projection.distance.as_meters() <= to_vertex + 0.01);
        }
        assert!((0.0..=1.0).contains(&projection.offset));
    }
}

#[test]
fn window_around_the_true_segment_matches_full_scan() {
    let polyline = zigzag(30);
    for probe in probes() {
        let full = polyline.nearest_point(&probe, None);
        let windowed = polyline.nearest_point(&probe, Some(SearchHint::new(full.segment_index, 2)));
        assert_eq!(full, windowed);
    }
}

#[test]
fn out_of_range_hint_is_clamped() {
    let polyline = zigzag(10);
    let probe = Coordinate::new(37.0089, 127.0);
    let full = polyline.nearest_point(&probe, None);
    let windowed = polyline.nearest_point(&probe, Some(SearchHint::new(500, 3)));
    assert_eq!(full, windowed);
}

#[test]
fn split_halves_rejoin_to_the_original() {
    let polyline = zigzag(12);
    for turn in [0, 1, 5, 11, 40] {
        let halves = split_by_turn_index(&polyline, Some(turn));
        let turn = turn.min(11);
        assert_eq!(halves.outbound.len(), turn + 1);
        assert_eq!(halves.outbound.last(), halves.inbound.first());
        let rejoined: Vec<Coordinate> = halves
            .outbound
            .iter()
            .chain(halves.inbound.iter().skip(1))
            .copied()
            .collect();
        assert_eq!(rejoined, polyline.to_vec());
    }
}

#[test]
fn swapping_twice_restores_the_labels() {
    let halves = split_by_turn_index(&zigzag(8), Some(3));
    let swapped = halves.clone().swapped();
    assert_eq!(swapped.outbound, halves.inbound);
    assert_eq!(swapped.swapped(), halves);
}

#[test]
fn degenerate_polylines_are_flagged() {
    let probe = Coordinate::new(37.0, 127.0);
    let empty = Polyline::default().nearest_point(&probe, None);
    assert!(empty.degenerate);
    assert_eq!(empty.position, probe);

    let single = Polyline::from(vec![Coordinate::new(37.001, 127.0)]);
    let projection = single.nearest_point(&probe, None);
    assert!(projection.degenerate);
    assert_eq!(projection.position, Coordinate::new(37.001, 127.0));
}
