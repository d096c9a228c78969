use std::sync::Arc;

use snapline::prelude::*;

fn stop(id: &str, order: u32, direction: Direction) -> RouteStop {
    RouteStop {
        stop_id: id.into(),
        order,
        direction,
    }
}

/// Two sibling variants that both code every stop as outbound.
fn siblings() -> Vec<(Arc<str>, Vec<RouteStop>)> {
    vec![
        (
            "A".into(),
            vec![
                stop("s1", 1, Direction::Outbound),
                stop("s2", 2, Direction::Outbound),
            ],
        ),
        (
            "B".into(),
            vec![
                stop("s2", 1, Direction::Outbound),
                stop("s1", 2, Direction::Outbound),
            ],
        ),
    ]
}

#[test]
fn sibling_variants_fall_back_to_listing_order() {
    let resolver = DirectionResolver::new("34", siblings(), &DirectionConfig::default());
    assert!(resolver.is_ready());
    assert_eq!(resolver.resolve("s1", Some(1), None), Some(Direction::Outbound));
    assert_eq!(resolver.resolve("s1", Some(2), None), Some(Direction::Inbound));
    assert_eq!(resolver.resolve("s1", None, Some("B")), Some(Direction::Inbound));
    // without an order the two candidates disagree
    assert_eq!(resolver.resolve("s1", None, None), None);
}

#[test]
fn active_variants_narrow_the_candidates() {
    let mut resolver = DirectionResolver::new("34", siblings(), &DirectionConfig::default());
    resolver.set_active_variants(["A"]);
    assert_eq!(resolver.resolve("s1", None, None), Some(Direction::Outbound));
    resolver.set_active_variants(["nothing"]);
    assert_eq!(resolver.resolve("s1", None, None), None);
}

#[test]
fn nearest_order_wins_when_no_exact_match() {
    let mixed = vec![(
        Arc::<str>::from("L"),
        vec![
            stop("hub", 1, Direction::Outbound),
            stop("mid", 5, Direction::Outbound),
            stop("hub", 9, Direction::Inbound),
        ],
    )];
    let resolver = DirectionResolver::new("9", mixed, &DirectionConfig::default());
    assert_eq!(resolver.resolve("hub", Some(2), None), Some(Direction::Outbound));
    assert_eq!(resolver.resolve("hub", Some(8), None), Some(Direction::Inbound));
    assert_eq!(resolver.resolve("hub", Some(9), None), Some(Direction::Inbound));
}

#[test]
fn resolution_is_deterministic() {
    let resolver = DirectionResolver::new("34", siblings(), &DirectionConfig::default());
    let queries = [
        ("s1", Some(1), None),
        ("s2", Some(2), Some("A")),
        ("s2", None, None),
        ("missing", Some(1), None),
    ];
    let first: Vec<_> = queries
        .iter()
        .map(|(id, order, variant)| resolver.resolve(id, *order, *variant))
        .collect();
    for _ in 0..10 {
        let again: Vec<_> = queries
            .iter()
            .map(|(id, order, variant)| resolver.resolve(id, *order, *variant))
            .collect();
        assert_eq!(first, again);
    }
    assert_eq!(first[3], None);
}

#[test]
fn configured_stops_are_always_outbound() {
    let config = DirectionConfig {
        always_outbound: vec!["s2".to_string()],
    };
    let resolver = DirectionResolver::new("34", siblings(), &config);
    assert_eq!(resolver.resolve("s2", Some(1), Some("B")), Some(Direction::Outbound));
    assert_eq!(resolver.resolve("s1", Some(2), Some("B")), Some(Direction::Inbound));
}

#[test]
fn empty_resolver_resolves_nothing() {
    let resolver = DirectionResolver::for_route(&Repository::new(), "34", &DirectionConfig::default());
    assert!(!resolver.is_ready());
    assert_eq!(resolver.resolve("s1", Some(1), None), None);
}
