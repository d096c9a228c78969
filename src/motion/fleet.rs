use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    config::MotionConfig,
    motion::{Animator, MotionFrame, MotionOptions},
    shared::{geo::Coordinate, time::Timestamp},
};

/// One animator per tracked vehicle.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    config: MotionConfig,
    animators: HashMap<Arc<str>, Animator>,
}

impl Fleet {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            animators: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.animators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animators.is_empty()
    }

    /// Feeds a vehicle's new target, creating its animator on first sight.
    pub fn update(
        &mut self,
        vehicle_id: &Arc<str>,
        target: Coordinate,
        angle: f64,
        options: &MotionOptions,
        now: Timestamp,
    ) -> Option<MotionFrame> {
        self.animators
            .entry(vehicle_id.clone())
            .or_insert_with(|| Animator::new(self.config.clone()))
            .update(target, angle, options, now)
    }

    /// Ticks every animator. Only vehicles with a frame to emit are returned, sorted by
    /// vehicle id.
    pub fn tick(&mut self, now: Timestamp) -> Vec<(Arc<str>, MotionFrame)> {
        let mut frames: Vec<(Arc<str>, MotionFrame)> = self
            .animators
            .iter_mut()
            .filter_map(|(id, animator)| Some((id.clone(), animator.tick(now)?)))
            .collect();
        frames.sort_by(|a, b| a.0.cmp(&b.0));
        frames
    }

    pub fn current(&self, vehicle_id: &str) -> Option<MotionFrame> {
        self.animators.get(vehicle_id)?.current()
    }

    /// Rendered state of every vehicle, sorted by vehicle id.
    pub fn snapshot(&self) -> Vec<(Arc<str>, MotionFrame)> {
        let mut frames: Vec<(Arc<str>, MotionFrame)> = self
            .animators
            .iter()
            .filter_map(|(id, animator)| Some((id.clone(), animator.current()?)))
            .collect();
        frames.sort_by(|a, b| a.0.cmp(&b.0));
        frames
    }

    /// Drops every vehicle that is not in `vehicle_ids`.
    pub fn retain<'a, I>(&mut self, vehicle_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: HashSet<&str> = vehicle_ids.into_iter().collect();
        self.animators.retain(|id, _| keep.contains(id.as_ref()));
    }

    pub fn remove(&mut self, vehicle_id: &str) -> bool {
        self.animators.remove(vehicle_id).is_some()
    }

    /// Drops every animation, used when the selected route changes.
    pub fn clear(&mut self) {
        self.animators.clear();
    }
}

#[test]
fn vehicles_are_created_and_dropped() {
    let mut fleet = Fleet::default();
    let options = MotionOptions::default();
    let now = Timestamp::from_millis(0);
    let a: Arc<str> = "a".into();
    let b: Arc<str> = "b".into();
    assert!(fleet.update(&a, Coordinate::new(37.0, 127.0), 0.0, &options, now).is_some());
    assert!(fleet.update(&b, Coordinate::new(37.1, 127.0), 0.0, &options, now).is_some());
    assert_eq!(fleet.len(), 2);

    fleet.retain(["b"]);
    assert_eq!(fleet.len(), 1);
    assert!(fleet.current("a").is_none());
    assert!(fleet.current("b").is_some());

    fleet.clear();
    assert!(fleet.is_empty());
}

#[test]
fn tick_reports_only_moving_vehicles() {
    let mut fleet = Fleet::default();
    let options = MotionOptions::default();
    let a: Arc<str> = "a".into();
    let b: Arc<str> = "b".into();
    let start = Timestamp::from_millis(0);
    fleet.update(&a, Coordinate::new(37.0, 127.0), 0.0, &options, start);
    fleet.update(&b, Coordinate::new(37.1, 127.0), 0.0, &options, start);
    fleet.update(&a, Coordinate::new(37.001, 127.0), 0.0, &options, start);

    let frames = fleet.tick(Timestamp::from_millis(16));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0.as_ref(), "a");
    assert_eq!(fleet.snapshot().len(), 2);
}
