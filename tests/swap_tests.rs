use snapline::{
    prelude::*,
    swap::{SwapScores, needs_swap},
};

/// Northbound along 127.0, southbound along 127.002.
fn labeled() -> RoutePolylines {
    RoutePolylines {
        outbound: (0..11)
            .map(|i| Coordinate::new(37.0 + i as f64 * 0.001, 127.0))
            .collect(),
        inbound: (0..11)
            .rev()
            .map(|i| Coordinate::new(37.0 + i as f64 * 0.001, 127.002))
            .collect(),
    }
}

fn stations() -> Vec<(Coordinate, Direction)> {
    let mut stops: Vec<(Coordinate, Direction)> = (0..5)
        .map(|i| (Coordinate::new(37.001 + i as f64 * 0.002, 127.00005), Direction::Outbound))
        .collect();
    stops.extend(
        (0..5).map(|i| (Coordinate::new(37.009 - i as f64 * 0.002, 127.00195), Direction::Inbound)),
    );
    stops
}

#[test]
fn swap_decision_flips_with_the_labels() {
    let config = SwapConfig::default();
    let polylines = labeled();
    assert!(!needs_swap(&stations(), &polylines, &config));
    let reversed = polylines.clone().swapped();
    assert!(needs_swap(&stations(), &reversed, &config));
    // correcting the reversed labels lands back on the original
    assert_eq!(reversed.swapped(), polylines);
}

#[test]
fn one_sided_evidence_never_swaps() {
    let config = SwapConfig::default();
    let outbound_only: Vec<_> = stations()
        .into_iter()
        .filter(|(_, direction)| *direction == Direction::Outbound)
        .collect();
    assert!(!needs_swap(&outbound_only, &labeled().swapped(), &config));
    assert!(SwapScores::measure(&outbound_only, &labeled(), &config).is_none());
}

#[test]
fn sample_cap_keeps_the_decision() {
    let config = SwapConfig {
        sample_cap: 2,
        ..Default::default()
    };
    assert!(needs_swap(&stations(), &labeled().swapped(), &config));
    let scores = SwapScores::measure(&stations(), &labeled(), &config).unwrap();
    assert!(scores.outbound_on_outbound < scores.outbound_on_inbound);
    assert!(scores.inbound_on_inbound < scores.inbound_on_outbound);
}
