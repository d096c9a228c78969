use std::{path::PathBuf, sync::Arc};

use snapline::prelude::*;

fn repository() -> Arc<Repository> {
    let path = PathBuf::from(format!("{}/tests/data", env!("CARGO_MANIFEST_DIR")));
    let source = Source::default().from_directory(path);
    Arc::new(
        Repository::new()
            .with_source(&source, &SwapConfig::default())
            .unwrap(),
    )
}

fn at(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

fn fix(latitude: f64, longitude: f64, stop_id: &str, order: u32) -> VehicleFix {
    VehicleFix::new("bus-1", Coordinate::new(latitude, longitude))
        .at_stop(stop_id, Some(order))
        .on_variant("V1")
}

#[test]
fn fixes_snap_to_the_resolved_direction() {
    let session = RouteSession::new(repository(), "34", Config::default());
    assert_eq!(session.resolve_direction("a", Some(1), None), Some(Direction::Outbound));
    assert_eq!(session.resolve_direction("c", Some(3), None), Some(Direction::Inbound));

    // a couple of meters east of the northbound half
    let outbound = session.snap_fix(&fix(37.0005, 127.00002, "a", 1));
    assert!(outbound.snapped);
    assert_eq!(outbound.direction, Some(Direction::Outbound));
    assert_eq!(outbound.position.longitude, 127.0);
    assert!(outbound.angle.abs() < 1e-6);

    // a couple of meters west of the southbound half
    let inbound = session.snap_fix(&fix(37.0005, 127.00098, "c", 3));
    assert!(inbound.snapped);
    assert_eq!(inbound.direction, Some(Direction::Inbound));
    assert!((inbound.angle - 180.0).abs() < 1e-6);
}

#[test]
fn off_route_fixes_stay_raw() {
    let session = RouteSession::new(repository(), "34", Config::default());
    let far = fix(37.02, 127.0, "a", 1);
    let snap = session.snap_fix(&far);
    assert!(!snap.snapped);
    assert_eq!(snap.position, far.position);
    assert_eq!(snap.direction, Some(Direction::Outbound));
    assert!(snap.distance.as_meters() > 50.0);
}

#[test]
fn vehicles_animate_between_polls() {
    let mut session = RouteSession::new(repository(), "34", Config::default());
    let first = session.apply_fixes(&[fix(37.0002, 127.00002, "a", 1)], at(0));
    assert_eq!(first.len(), 1);
    assert!(first[0].frame.is_some());

    let second = session.apply_fixes(&[fix(37.0015, 127.00002, "b", 2)], at(10_000));
    assert_eq!(second[0].frame, None);

    assert_eq!(session.tick(at(10_000)).len(), 1);
    let last = session.tick(at(14_000));
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].direction, Some(Direction::Outbound));
    assert!(last[0].snapped);
    let expected = Coordinate::new(37.0015, 127.0);
    assert!(last[0].position.approx_distance(&expected).as_meters() < 0.05);
    assert!(session.tick(at(14_016)).is_empty());

    let frames = session.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].vehicle_id.as_ref(), "bus-1");
}

#[test]
fn switching_routes_clears_vehicles() {
    let mut session = RouteSession::new(repository(), "34", Config::default());
    session.apply_fixes(&[fix(37.0002, 127.00002, "a", 1)], at(0));
    assert_eq!(session.frames().len(), 1);

    session.select_route("7");
    assert!(session.frames().is_empty());
    assert_eq!(session.resolve_direction("e", Some(1), None), Some(Direction::Outbound));
    assert_eq!(session.resolve_direction("a", Some(1), None), None);

    let ferry = VehicleFix::new("bus-7", Coordinate::new(37.01002, 127.0025)).on_variant("V7");
    let snapshots = session.apply_fixes(&[ferry], at(100));
    assert!(snapshots[0].snap.snapped);
    assert_eq!(snapshots[0].snap.direction, Some(Direction::Outbound));
}
