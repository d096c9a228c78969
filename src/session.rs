use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use crate::{
    config::Config,
    direction::{Direction, DirectionResolver},
    motion::{Fleet, MotionFrame, MotionOptions},
    repository::{Repository, RouteShape},
    shared::{geo::Coordinate, time::Timestamp},
    snap::{SnapEngine, SnapResult},
    vehicle::VehicleFix,
};

/// What a fix resolved to, before animation.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSnapshot {
    pub vehicle_id: Arc<str>,
    pub variant_id: Option<Arc<str>>,
    pub snap: SnapResult,
    /// Set when the update changed the rendered state right away.
    pub frame: Option<MotionFrame>,
}

/// A rendered vehicle marker.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleFrame {
    pub vehicle_id: Arc<str>,
    pub position: Coordinate,
    pub angle: f64,
    pub direction: Option<Direction>,
    pub snapped: bool,
}

#[derive(Debug, Clone)]
struct Tracked {
    direction: Option<Direction>,
    snapped: bool,
}

/// Everything needed to follow the vehicles of one selected route.
///
/// Fixes go through the direction resolver and the snap engine and then drive one
/// animator per vehicle. Selecting another route rebuilds the resolver and drops every
/// animation.
#[derive(Debug, Clone)]
pub struct RouteSession {
    repository: Arc<Repository>,
    config: Config,
    resolver: DirectionResolver,
    engine: SnapEngine,
    fleet: Fleet,
    tracked: HashMap<Arc<str>, Tracked>,
}

impl RouteSession {
    pub fn new(repository: Arc<Repository>, route_name: &str, config: Config) -> Self {
        let resolver = DirectionResolver::for_route(&repository, route_name, &config.direction);
        Self {
            engine: SnapEngine::new(config.snap.clone()),
            fleet: Fleet::new(config.motion.clone()),
            repository,
            config,
            resolver,
            tracked: HashMap::new(),
        }
    }

    pub fn route_name(&self) -> &str {
        self.resolver.route_name()
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Switches to another route. Nothing from the previous route survives.
    pub fn select_route(&mut self, route_name: &str) {
        info!("Selecting route {route_name}");
        self.resolver =
            DirectionResolver::for_route(&self.repository, route_name, &self.config.direction);
        self.reset();
    }

    /// Swaps in freshly loaded static data and selects `route_name` from it.
    pub fn set_repository(&mut self, repository: Arc<Repository>, route_name: &str) {
        self.repository = repository;
        self.select_route(route_name);
    }

    /// Drops every animation, markers are placed fresh on the next fix.
    pub fn reset(&mut self) {
        self.fleet.clear();
        self.tracked.clear();
    }

    pub fn resolve_direction(
        &self,
        stop_id: &str,
        order: Option<u32>,
        variant_id: Option<&str>,
    ) -> Option<Direction> {
        self.resolver.resolve(stop_id, order, variant_id)
    }

    pub fn snap_fix(&self, fix: &VehicleFix) -> SnapResult {
        self.snap_with_shape(fix).0
    }

    /// Resolves, snaps and animates one poll's worth of fixes, in order.
    /// Vehicles missing from `fixes` are dropped.
    pub fn apply_fixes(&mut self, fixes: &[VehicleFix], now: Timestamp) -> Vec<VehicleSnapshot> {
        self.resolver.set_active_variants(
            fixes
                .iter()
                .filter_map(|fix| fix.variant_id.as_deref()),
        );

        let repository = self.repository.clone();
        let snapshots: Vec<VehicleSnapshot> = fixes
            .iter()
            .map(|fix| {
                let (snap, shape) = snap_with_shape(&repository, &self.resolver, &self.engine, fix);
                let options = match (snap.snapped, snap.direction, shape) {
                    (true, Some(direction), Some(shape)) => {
                        MotionOptions::along(shape.polyline(direction).clone())
                    }
                    _ => MotionOptions::default(),
                };
                let frame = self
                    .fleet
                    .update(&fix.vehicle_id, snap.position, snap.angle, &options, now);
                self.tracked.insert(
                    fix.vehicle_id.clone(),
                    Tracked {
                        direction: snap.direction,
                        snapped: snap.snapped,
                    },
                );
                VehicleSnapshot {
                    vehicle_id: fix.vehicle_id.clone(),
                    variant_id: fix.variant_id.clone(),
                    snap,
                    frame,
                }
            })
            .collect();

        self.fleet
            .retain(fixes.iter().map(|fix| fix.vehicle_id.as_ref()));
        self.tracked
            .retain(|id, _| fixes.iter().any(|fix| fix.vehicle_id == *id));
        debug!(
            "Applied {} fixes on route {}",
            fixes.len(),
            self.route_name()
        );
        snapshots
    }

    /// Advances every animation. Only vehicles with a frame to emit are returned.
    pub fn tick(&mut self, now: Timestamp) -> Vec<VehicleFrame> {
        self.fleet
            .tick(now)
            .into_iter()
            .map(|(id, frame)| self.to_vehicle_frame(id, frame))
            .collect()
    }

    /// The rendered state of every tracked vehicle.
    pub fn frames(&self) -> Vec<VehicleFrame> {
        self.fleet
            .snapshot()
            .into_iter()
            .map(|(id, frame)| self.to_vehicle_frame(id, frame))
            .collect()
    }

    fn to_vehicle_frame(&self, vehicle_id: Arc<str>, frame: MotionFrame) -> VehicleFrame {
        let tracked = self.tracked.get(&vehicle_id);
        VehicleFrame {
            position: frame.position,
            angle: frame.angle,
            direction: tracked.and_then(|tracked| tracked.direction),
            snapped: tracked.is_some_and(|tracked| tracked.snapped),
            vehicle_id,
        }
    }

    fn snap_with_shape(&self, fix: &VehicleFix) -> (SnapResult, Option<&RouteShape>) {
        snap_with_shape(&self.repository, &self.resolver, &self.engine, fix)
    }
}

/// Picks the geometry for a fix: its own variant when known and loaded, otherwise the
/// route's variant serving the reported stop, otherwise the route's first geometry.
fn shape_for_fix<'a>(
    repository: &'a Repository,
    route_name: &str,
    fix: &VehicleFix,
) -> Option<&'a RouteShape> {
    if let Some(shape) = fix
        .variant_id
        .as_deref()
        .and_then(|variant_id| repository.shape_by_variant_id(variant_id))
    {
        return Some(shape);
    }
    let shapes = repository.shapes_by_route_name(route_name);
    fix.stop_id
        .as_deref()
        .and_then(|stop_id| {
            shapes
                .iter()
                .find(|shape| shape.stop_index.by_id(stop_id).is_some())
                .copied()
        })
        .or_else(|| shapes.first().copied())
}

fn snap_with_shape<'a>(
    repository: &'a Repository,
    resolver: &DirectionResolver,
    engine: &SnapEngine,
    fix: &VehicleFix,
) -> (SnapResult, Option<&'a RouteShape>) {
    let direction = fix.stop_id.as_deref().and_then(|stop_id| {
        resolver.resolve(stop_id, fix.order, fix.variant_id.as_deref())
    });
    match shape_for_fix(repository, resolver.route_name(), fix) {
        Some(shape) => {
            let snap = engine.snap_to_shape(
                &fix.position,
                direction,
                shape,
                fix.stop_id.as_deref(),
                fix.order,
            );
            (snap, Some(shape))
        }
        None => (SnapResult::raw(fix.position, direction), None),
    }
}

#[test]
fn fixes_render_raw_before_data_is_loaded() {
    let mut session = RouteSession::new(Arc::new(Repository::new()), "34", Config::default());
    let fix = VehicleFix::new("bus-1", Coordinate::new(37.0, 127.0)).at_stop("a", Some(3));
    let snapshots = session.apply_fixes(&[fix.clone()], Timestamp::from_millis(0));
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].snap, SnapResult::raw(fix.position, None));
    assert_eq!(snapshots[0].frame.map(|frame| frame.position), Some(fix.position));

    let frames = session.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].direction, None);
    assert!(!frames[0].snapped);
}

#[test]
fn vanished_vehicles_and_route_changes_reset_state() {
    let mut session = RouteSession::new(Arc::new(Repository::new()), "34", Config::default());
    let a = VehicleFix::new("a", Coordinate::new(37.0, 127.0));
    let b = VehicleFix::new("b", Coordinate::new(37.1, 127.0));
    session.apply_fixes(&[a.clone(), b], Timestamp::from_millis(0));
    assert_eq!(session.frames().len(), 2);

    session.apply_fixes(&[a.clone()], Timestamp::from_millis(1000));
    assert_eq!(session.frames().len(), 1);

    session.select_route("7");
    assert_eq!(session.route_name(), "7");
    assert!(session.frames().is_empty());
}
