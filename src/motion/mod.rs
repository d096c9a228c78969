//! Continuous-time marker animation between successive snapped fixes.

mod fleet;
mod path;

pub use fleet::*;
pub use path::*;

use std::time::Duration;

use tracing::{debug, trace};

use crate::{
    config::MotionConfig,
    polyline::Polyline,
    shared::{
        geo::{Coordinate, interpolate_angle},
        time::Timestamp,
    },
};

/// A rendered marker state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionFrame {
    pub position: Coordinate,
    /// Heading in degrees, 0 is north.
    pub angle: f64,
}

impl MotionFrame {
    pub const fn new(position: Coordinate, angle: f64) -> Self {
        Self { position, angle }
    }
}

/// Per update knobs.
#[derive(Debug, Clone, Default)]
pub struct MotionOptions {
    /// Path to follow. Without one the marker moves in a straight line.
    pub polyline: Option<Polyline>,
    /// Overrides the configured animation duration.
    pub duration: Option<Duration>,
    /// Places the marker at the target immediately, no animation.
    pub reset: bool,
}

impl MotionOptions {
    pub fn along(polyline: Polyline) -> Self {
        Self {
            polyline: Some(polyline),
            ..Default::default()
        }
    }

    pub fn reset() -> Self {
        Self {
            reset: true,
            ..Default::default()
        }
    }

    fn usable_polyline(&self) -> Option<&Polyline> {
        self.polyline.as_ref().filter(|polyline| !polyline.is_degenerate())
    }
}

#[derive(Debug, Clone)]
struct Animation {
    path: AnimationPath,
    started_at: Timestamp,
    duration: Duration,
    start_angle: f64,
    end_angle: f64,
    end: Coordinate,
}

impl Animation {
    fn progress(&self, now: Timestamp) -> f64 {
        now.progress_since(self.started_at, self.duration)
    }

    /// Frame at linear progress `progress`, eased.
    fn frame_at(&self, progress: f64) -> MotionFrame {
        let eased = ease_out_quart(progress);
        let Some((position, segment)) = self.path.position_at(eased) else {
            return MotionFrame::new(self.end, self.end_angle);
        };
        let angle = if self.path.follows_polyline() {
            self.path
                .segment_bearing(segment)
                .unwrap_or(self.end_angle)
        } else {
            interpolate_angle(self.start_angle, self.end_angle, eased)
        };
        MotionFrame::new(position, angle)
    }
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Animating(Animation),
}

/// Animates one marker.
///
/// `update` hands the animator a new target, `tick` advances it on the caller's frame
/// clock and returns the states worth emitting. `current` is the unthrottled rendered
/// state and always matches the last emission once an animation completes.
#[derive(Debug, Clone, Default)]
pub struct Animator {
    config: MotionConfig,
    state: State,
    rendered: Option<MotionFrame>,
    target: Option<Coordinate>,
    last_emitted: Option<Timestamp>,
}

impl Animator {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, State::Animating(_))
    }

    pub fn current(&self) -> Option<MotionFrame> {
        self.rendered
    }

    /// Drops the running animation. The marker stays where it was last rendered.
    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }

    /// Hands the animator a new target.
    ///
    /// Returns a frame when the rendered state changed right away (placement, heading
    /// refresh or teleport). Animated moves return None and emit through `tick`.
    pub fn update(
        &mut self,
        target: Coordinate,
        angle: f64,
        options: &MotionOptions,
        now: Timestamp,
    ) -> Option<MotionFrame> {
        let Some(rendered) = self.rendered_at(now) else {
            return Some(self.place(target, angle, options, now));
        };
        if options.reset {
            return Some(self.place(target, angle, options, now));
        }

        if self.target == Some(target) {
            return match &mut self.state {
                State::Animating(animation) => {
                    animation.end_angle = angle;
                    None
                }
                State::Idle => {
                    let frame = MotionFrame::new(rendered.position, angle);
                    self.rendered = Some(frame);
                    self.last_emitted = Some(now);
                    Some(frame)
                }
            };
        }

        let path = match options.usable_polyline() {
            Some(polyline) => {
                let start = polyline.nearest_point(&rendered.position, None);
                let end = polyline.nearest_point(&target, None);
                if end.is_level_with(&start, self.config.offset_epsilon) {
                    return Some(self.jump(rendered.position, angle, target, now));
                }
                if end.is_behind(&start, self.config.offset_epsilon) {
                    let displacement = start.position.approx_distance(&end.position);
                    if displacement <= self.config.jitter_tolerance {
                        trace!("Ignoring backward jitter of {displacement}");
                        return None;
                    }
                    debug!("Teleporting backward by {displacement}");
                    return Some(self.jump(end.position, angle, target, now));
                }
                AnimationPath::along(polyline, &start, &end)
            }
            None => AnimationPath::direct(rendered.position, target),
        };

        let Some(end) = path.end() else {
            return Some(self.jump(target, angle, target, now));
        };
        if path.points().len() < 2 {
            return Some(self.jump(end, angle, target, now));
        }

        // Restart from where the marker is now, not where the last animation began
        self.rendered = Some(rendered);
        self.target = Some(target);
        self.last_emitted = None;
        self.state = State::Animating(Animation {
            path,
            started_at: now,
            duration: options.duration.unwrap_or(self.config.duration),
            start_angle: rendered.angle,
            end_angle: angle,
            end,
        });
        None
    }

    /// Advances the running animation to `now`.
    ///
    /// The first tick and the completing tick are always returned, the ones in between
    /// only when at least `throttle` passed since the last emission.
    pub fn tick(&mut self, now: Timestamp) -> Option<MotionFrame> {
        let State::Animating(animation) = &self.state else {
            return None;
        };
        let progress = animation.progress(now);
        if progress >= 1.0 {
            let frame = MotionFrame::new(animation.end, animation.end_angle);
            self.state = State::Idle;
            self.rendered = Some(frame);
            self.last_emitted = Some(now);
            return Some(frame);
        }

        let frame = animation.frame_at(progress);
        self.rendered = Some(frame);
        let due = match self.last_emitted {
            None => true,
            Some(last) => now - last >= self.config.throttle,
        };
        if !due {
            return None;
        }
        self.last_emitted = Some(now);
        Some(frame)
    }

    /// The rendered state as it stands at `now`, without touching the animation.
    fn rendered_at(&self, now: Timestamp) -> Option<MotionFrame> {
        match &self.state {
            State::Animating(animation) => {
                let progress = animation.progress(now);
                if progress >= 1.0 {
                    Some(MotionFrame::new(animation.end, animation.end_angle))
                } else {
                    Some(animation.frame_at(progress))
                }
            }
            State::Idle => self.rendered,
        }
    }

    fn place(
        &mut self,
        target: Coordinate,
        angle: f64,
        options: &MotionOptions,
        now: Timestamp,
    ) -> MotionFrame {
        let position = options
            .usable_polyline()
            .map(|polyline| polyline.nearest_point(&target, None).position)
            .unwrap_or(target);
        self.jump(position, angle, target, now)
    }

    fn jump(
        &mut self,
        position: Coordinate,
        angle: f64,
        target: Coordinate,
        now: Timestamp,
    ) -> MotionFrame {
        let frame = MotionFrame::new(position, angle);
        self.state = State::Idle;
        self.rendered = Some(frame);
        self.target = Some(target);
        self.last_emitted = Some(now);
        frame
    }
}

/// `1 - (1 - t)^4`, fast start and a long deceleration.
pub fn ease_out_quart(t: f64) -> f64 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(4)
}

#[cfg(test)]
fn straight_line() -> Polyline {
    // 30 segments of about 111 m heading north
    (0..31)
        .map(|i| Coordinate::new(37.0 + i as f64 * 0.001, 127.0))
        .collect()
}

#[cfg(test)]
fn at(polyline: &Polyline, segment: usize, offset: f64) -> Coordinate {
    polyline[segment].lerp(&polyline[segment + 1], offset)
}

#[test]
fn ease_out_quart_bounds() {
    assert_eq!(ease_out_quart(0.0), 0.0);
    assert_eq!(ease_out_quart(1.0), 1.0);
    assert!((ease_out_quart(0.5) - 0.9375).abs() < 1e-12);
}

#[test]
fn first_update_places_immediately() {
    let polyline = straight_line();
    let mut animator = Animator::default();
    let raw = Coordinate::new(37.0105, 127.0001);
    let frame = animator
        .update(raw, 10.0, &MotionOptions::along(polyline), Timestamp::from_millis(0))
        .unwrap();
    assert!((frame.position.longitude - 127.0).abs() < 1e-9);
    assert_eq!(frame.angle, 10.0);
    assert!(!animator.is_animating());
}

#[test]
fn same_target_only_refreshes_heading() {
    let mut animator = Animator::default();
    let raw = Coordinate::new(37.0, 127.0);
    animator.update(raw, 10.0, &MotionOptions::default(), Timestamp::from_millis(0));
    let frame = animator
        .update(raw, 80.0, &MotionOptions::default(), Timestamp::from_millis(500))
        .unwrap();
    assert_eq!(frame, MotionFrame::new(raw, 80.0));
    assert!(!animator.is_animating());
}

#[test]
fn target_within_epsilon_refreshes_heading() {
    let polyline = straight_line();
    let options = MotionOptions::along(polyline.clone());
    let start = at(&polyline, 10, 0.5);
    for offset in [0.4995, 0.5005] {
        let mut animator = Animator::default();
        animator.update(start, 0.0, &options, Timestamp::from_millis(0));
        let frame = animator
            .update(
                at(&polyline, 10, offset),
                90.0,
                &options,
                Timestamp::from_millis(1_000),
            )
            .unwrap();
        assert!(!animator.is_animating());
        assert_eq!(frame.angle, 90.0);
        assert!(frame.position.approx_distance(&start).as_meters() < 0.01);
        assert_eq!(animator.tick(Timestamp::from_millis(1_016)), None);
    }
}

#[test]
fn small_backward_move_is_ignored() {
    let polyline = straight_line();
    let options = MotionOptions::along(polyline.clone());
    let mut animator = Animator::default();
    let start = at(&polyline, 10, 0.9);
    animator.update(start, 0.0, &options, Timestamp::from_millis(0));
    // 0.05 of a 111 m segment is about 5.6 m
    let noisy = at(&polyline, 10, 0.85);
    assert_eq!(animator.update(noisy, 0.0, &options, Timestamp::from_millis(1000)), None);
    assert!(!animator.is_animating());
    let rendered = animator.current().unwrap().position;
    assert!(rendered.approx_distance(&start).as_meters() < 0.01);
    assert_eq!(animator.tick(Timestamp::from_millis(1016)), None);
}

#[test]
fn large_backward_move_teleports() {
    let polyline = straight_line();
    let options = MotionOptions::along(polyline.clone());
    let mut animator = Animator::default();
    animator.update(at(&polyline, 10, 0.5), 0.0, &options, Timestamp::from_millis(0));
    let target = at(&polyline, 2, 0.5);
    let frame = animator
        .update(target, 180.0, &options, Timestamp::from_millis(1000))
        .unwrap();
    assert!(frame.position.approx_distance(&target).as_meters() < 0.01);
    assert_eq!(frame.angle, 180.0);
    assert!(!animator.is_animating());
}

#[test]
fn forward_move_follows_polyline_and_completes() {
    let polyline = straight_line();
    let options = MotionOptions::along(polyline.clone());
    let mut animator = Animator::default();
    animator.update(at(&polyline, 2, 0.5), 0.0, &options, Timestamp::from_millis(0));
    let target = at(&polyline, 6, 0.5);
    assert_eq!(animator.update(target, 5.0, &options, Timestamp::from_millis(100)), None);
    assert!(animator.is_animating());

    let first = animator.tick(Timestamp::from_millis(100)).unwrap();
    assert!(first.position.approx_distance(&at(&polyline, 2, 0.5)).as_meters() < 0.01);
    // the polyline heads due north, so the traversed segment bearing is 0
    let mid = animator.tick(Timestamp::from_millis(2100)).unwrap();
    assert!(mid.angle.abs() < 1e-6);
    assert!(mid.position.latitude > first.position.latitude);

    let last = animator.tick(Timestamp::from_millis(4100)).unwrap();
    assert!(last.position.approx_distance(&target).as_meters() < 0.01);
    assert_eq!(last.angle, 5.0);
    assert_eq!(animator.current(), Some(last));
    assert!(!animator.is_animating());
}

#[test]
fn direct_path_interpolates_heading_across_north() {
    let mut animator = Animator::default();
    animator.update(
        Coordinate::new(37.0, 127.0),
        350.0,
        &MotionOptions::default(),
        Timestamp::from_millis(0),
    );
    animator.update(
        Coordinate::new(37.001, 127.0),
        10.0,
        &MotionOptions::default(),
        Timestamp::from_millis(0),
    );
    animator.tick(Timestamp::from_millis(0));
    let frame = animator.tick(Timestamp::from_millis(600)).unwrap();
    // still on the short arc through north, never near 180
    assert!(frame.angle > 350.0 || frame.angle < 10.0);
}

#[test]
fn throttle_bounds_emissions() {
    let mut animator = Animator::default();
    animator.update(
        Coordinate::new(37.0, 127.0),
        0.0,
        &MotionOptions::default(),
        Timestamp::from_millis(0),
    );
    animator.update(
        Coordinate::new(37.01, 127.0),
        0.0,
        &MotionOptions::default(),
        Timestamp::from_millis(0),
    );
    // a 60 Hz frame clock over the whole 4 s animation
    let emitted = (0..=250)
        .filter_map(|frame| animator.tick(Timestamp::from_millis(frame * 16)))
        .count();
    assert!(emitted >= 4, "emitted {emitted}");
    assert!(emitted <= 83, "emitted {emitted}");
    assert!(!animator.is_animating());
}

#[test]
fn new_target_mid_flight_restarts_from_rendered_position() {
    let polyline = straight_line();
    let options = MotionOptions::along(polyline.clone());
    let mut animator = Animator::default();
    animator.update(at(&polyline, 0, 0.0), 0.0, &options, Timestamp::from_millis(0));
    animator.update(at(&polyline, 10, 0.0), 0.0, &options, Timestamp::from_millis(0));
    animator.tick(Timestamp::from_millis(0));
    let rendered = animator.tick(Timestamp::from_millis(1000)).unwrap();

    animator.update(at(&polyline, 20, 0.0), 0.0, &options, Timestamp::from_millis(1000));
    let restarted = animator.tick(Timestamp::from_millis(1000)).unwrap();
    assert!(restarted.position.approx_distance(&rendered.position).as_meters() < 0.01);
}
