use std::time::Duration;

use snapline::prelude::*;

/// Due north along 127.0, one vertex every ~111 m.
fn northbound() -> Polyline {
    (0..11)
        .map(|i| Coordinate::new(37.0 + i as f64 * 0.001, 127.0))
        .collect()
}

fn at(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

fn placed(latitude: f64) -> (Animator, MotionOptions) {
    let mut animator = Animator::new(MotionConfig::default());
    let options = MotionOptions::along(northbound());
    let frame = animator.update(Coordinate::new(latitude, 127.0), 0.0, &options, at(0));
    assert!(frame.is_some());
    (animator, options)
}

fn close(a: &Coordinate, b: &Coordinate) -> bool {
    a.approx_distance(b).as_meters() < 0.05
}

#[test]
fn small_backward_moves_are_ignored() {
    let (mut animator, options) = placed(37.005);
    // about 5.6 m back
    let frame = animator.update(Coordinate::new(37.00495, 127.0), 0.0, &options, at(1_000));
    assert_eq!(frame, None);
    assert!(!animator.is_animating());
    let current = animator.current().unwrap();
    assert!(close(&current.position, &Coordinate::new(37.005, 127.0)));
}

#[test]
fn large_backward_moves_teleport() {
    let (mut animator, options) = placed(37.005);
    // about 500 m back
    let target = Coordinate::new(37.0005, 127.0);
    let frame = animator
        .update(target, 180.0, &options, at(1_000))
        .unwrap();
    assert!(close(&frame.position, &target));
    assert_eq!(frame.angle, 180.0);
    assert!(!animator.is_animating());
    assert_eq!(animator.tick(at(1_016)), None);
}

#[test]
fn forward_moves_ease_along_the_path() {
    let (mut animator, options) = placed(37.001);
    let target = Coordinate::new(37.003, 127.0);
    assert_eq!(animator.update(target, 0.0, &options, at(1_000)), None);
    assert!(animator.is_animating());

    let first = animator.tick(at(1_000)).unwrap();
    assert!(close(&first.position, &Coordinate::new(37.001, 127.0)));

    // halfway in time, 1 - 0.5^4 of the way in distance
    let middle = animator.tick(at(3_000)).unwrap();
    assert!(close(&middle.position, &Coordinate::new(37.001 + 0.002 * 0.9375, 127.0)));

    let last = animator.tick(at(5_000)).unwrap();
    assert!(close(&last.position, &target));
    assert!(!animator.is_animating());
    assert_eq!(animator.tick(at(5_016)), None);
}

#[test]
fn intermediate_frames_respect_the_throttle() {
    let (mut animator, options) = placed(37.001);
    animator.update(Coordinate::new(37.006, 127.0), 0.0, &options, at(0));

    let mut emitted: Vec<u64> = Vec::new();
    let mut now = 0;
    while now <= 4_100 {
        if animator.tick(at(now)).is_some() {
            emitted.push(now);
        }
        now += 16;
    }
    assert!(!animator.is_animating());
    assert!(emitted.len() >= 4_000 / 100 && emitted.len() <= 4_000 / 50 + 2);
    let (last, intermediate) = emitted.split_last().unwrap();
    for pair in intermediate.windows(2) {
        assert!(pair[1] - pair[0] >= 50);
    }
    assert!(*last >= 4_000);
}

#[test]
fn duration_override_is_honored() {
    let (mut animator, _) = placed(37.001);
    let options = MotionOptions {
        duration: Some(Duration::from_millis(500)),
        ..MotionOptions::along(northbound())
    };
    animator.update(Coordinate::new(37.002, 127.0), 0.0, &options, at(1_000));
    assert!(animator.tick(at(1_000)).is_some());
    let last = animator.tick(at(1_500)).unwrap();
    assert!(close(&last.position, &Coordinate::new(37.002, 127.0)));
    assert!(!animator.is_animating());
}

#[test]
fn reset_places_without_animating() {
    let (mut animator, _) = placed(37.001);
    let target = Coordinate::new(37.009, 127.0);
    let frame = animator
        .update(target, 90.0, &MotionOptions::reset(), at(1_000))
        .unwrap();
    assert_eq!(frame.position, target);
    assert!(!animator.is_animating());
}

#[test]
fn fleet_keeps_one_animator_per_vehicle() {
    let mut fleet = Fleet::new(MotionConfig::default());
    let options = MotionOptions::along(northbound());
    let a = "bus-a".into();
    let b = "bus-b".into();
    fleet.update(&a, Coordinate::new(37.001, 127.0), 0.0, &options, at(0));
    fleet.update(&b, Coordinate::new(37.004, 127.0), 0.0, &options, at(0));
    assert_eq!(fleet.len(), 2);

    fleet.update(&a, Coordinate::new(37.002, 127.0), 0.0, &options, at(100));
    let frames = fleet.tick(at(100));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0.as_ref(), "bus-a");

    fleet.retain(["bus-b"]);
    assert_eq!(fleet.len(), 1);
    assert!(fleet.current("bus-a").is_none());
}
