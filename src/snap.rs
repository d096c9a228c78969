//! Places a raw fix onto one of a route's two directed polylines.

use tracing::debug;

use crate::{
    config::SnapConfig,
    direction::Direction,
    polyline::{Projection, RoutePolylines, SearchHint},
    repository::RouteShape,
    shared::geo::{Coordinate, Distance},
};

/// Where a fix ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    pub position: Coordinate,
    /// Heading in degrees, 0 is north.
    pub angle: f64,
    /// None when the direction is unknown, which is never the same as inbound.
    pub direction: Option<Direction>,
    /// Segment of the chosen polyline. Always 0 for unsnapped results.
    pub segment_index: usize,
    /// Distance between the raw fix and the chosen projection, or the nearest one when
    /// the fix is off route.
    pub distance: Distance,
    /// False when the raw fix is returned unprojected.
    pub snapped: bool,
}

impl SnapResult {
    /// The raw fix, unprojected. Used when no geometry matches or none is loaded.
    pub fn raw(position: Coordinate, direction: Option<Direction>) -> Self {
        Self {
            position,
            angle: 0.0,
            direction,
            segment_index: 0,
            distance: Distance::ZERO,
            snapped: false,
        }
    }
}

/// Segment hints per direction, derived from the stop a vehicle last reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapHints {
    pub outbound: Option<usize>,
    pub inbound: Option<usize>,
}

impl SnapHints {
    /// Projects the stop's raw coordinate index onto each directed polyline.
    /// Missing stop data gives no hints, which means a full scan.
    pub fn from_stop(shape: &RouteShape, stop_id: Option<&str>, order: Option<u32>) -> Self {
        let hint = |direction| {
            let raw_index = shape.stop_index.lookup(stop_id, order, Some(direction))?;
            shape.segment_hint(raw_index, direction)
        };
        Self {
            outbound: hint(Direction::Outbound),
            inbound: hint(Direction::Inbound),
        }
    }

    pub fn get(&self, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Outbound => self.outbound,
            Direction::Inbound => self.inbound,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnapEngine {
    config: SnapConfig,
}

impl SnapEngine {
    pub fn new(config: SnapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    /// Snaps `position` onto the better of the two polylines.
    ///
    /// A resolved `direction_hint` wins whenever its projection is within the validity
    /// threshold, even if the other direction is closer. Otherwise the closest valid
    /// projection wins, ties going to the hinted direction and then to outbound. With
    /// no valid projection the raw fix comes back unsnapped.
    pub fn snap(
        &self,
        position: &Coordinate,
        direction_hint: Option<Direction>,
        polylines: &RoutePolylines,
        hints: SnapHints,
    ) -> SnapResult {
        let outbound = self.project(position, polylines, Direction::Outbound, hints);
        let inbound = self.project(position, polylines, Direction::Inbound, hints);
        let candidate = |direction| match direction {
            Direction::Outbound => outbound,
            Direction::Inbound => inbound,
        };
        let threshold = self.config.validity_threshold;
        let is_valid = |projection: &Projection| projection.distance <= threshold;

        if let Some(direction) = direction_hint
            && let Some(projection) = candidate(direction).filter(is_valid)
        {
            debug!(
                "Snapped to resolved direction {direction:?} at {}",
                projection.distance
            );
            return snapped(projection, direction);
        }

        let preference = match direction_hint {
            Some(Direction::Inbound) => [Direction::Inbound, Direction::Outbound],
            _ => [Direction::Outbound, Direction::Inbound],
        };
        let closest = |valid_only: bool| {
            preference
                .iter()
                .filter_map(|direction| {
                    let projection = candidate(*direction)?;
                    (!valid_only || is_valid(&projection)).then_some((*direction, projection))
                })
                .fold(None, |best: Option<(Direction, Projection)>, (direction, projection)| {
                    match best {
                        Some((_, current)) if current.distance <= projection.distance => best,
                        _ => Some((direction, projection)),
                    }
                })
        };

        if let Some((direction, projection)) = closest(true) {
            debug!(
                "Snapped to closest direction {direction:?} at {}",
                projection.distance
            );
            return snapped(projection, direction);
        }

        let mut result = SnapResult::raw(*position, direction_hint);
        if let Some((_, nearest)) = closest(false) {
            result.angle = nearest.bearing;
            result.distance = nearest.distance;
        }
        debug!("Fix at {position} is off route, nearest polyline {}", result.distance);
        result
    }

    /// Builds the hints from the shape's stop index and snaps against its polylines.
    pub fn snap_to_shape(
        &self,
        position: &Coordinate,
        direction_hint: Option<Direction>,
        shape: &RouteShape,
        stop_id: Option<&str>,
        order: Option<u32>,
    ) -> SnapResult {
        let hints = SnapHints::from_stop(shape, stop_id, order);
        self.snap(position, direction_hint, &shape.polylines, hints)
    }

    /// Windowed search first, a miss beyond the threshold falls back to a full scan.
    /// Degenerate polylines give no candidate.
    fn project(
        &self,
        position: &Coordinate,
        polylines: &RoutePolylines,
        direction: Direction,
        hints: SnapHints,
    ) -> Option<Projection> {
        let polyline = polylines.get(direction);
        if polyline.is_degenerate() {
            return None;
        }
        let hint = hints
            .get(direction)
            .map(|index| SearchHint::new(index, self.config.search_radius));
        let projection = polyline.nearest_point(position, hint);
        if hint.is_some() && projection.distance > self.config.validity_threshold {
            return Some(polyline.nearest_point(position, None));
        }
        Some(projection)
    }
}

fn snapped(projection: Projection, direction: Direction) -> SnapResult {
    SnapResult {
        position: projection.position,
        angle: projection.bearing,
        direction: Some(direction),
        segment_index: projection.segment_index,
        distance: projection.distance,
        snapped: true,
    }
}

#[cfg(test)]
fn parallel_polylines() -> RoutePolylines {
    use crate::polyline::Polyline;
    // two northbound/southbound lines about 22 m apart
    let west: Polyline = (0..20)
        .map(|i| Coordinate::new(37.0 + i as f64 * 0.0005, 127.0))
        .collect();
    let east: Polyline = (0..20)
        .rev()
        .map(|i| Coordinate::new(37.0 + i as f64 * 0.0005, 127.00025))
        .collect();
    RoutePolylines {
        outbound: west,
        inbound: east,
    }
}

#[test]
fn resolved_direction_wins_within_threshold() {
    let engine = SnapEngine::default();
    let polylines = parallel_polylines();
    // closer to outbound, but the resolver says inbound
    let fix = Coordinate::new(37.003, 127.00005);
    let result = engine.snap(&fix, Some(Direction::Inbound), &polylines, SnapHints::default());
    assert!(result.snapped);
    assert_eq!(result.direction, Some(Direction::Inbound));
    assert!((result.angle - 180.0).abs() < 0.01);

    let result = engine.snap(&fix, None, &polylines, SnapHints::default());
    assert_eq!(result.direction, Some(Direction::Outbound));
    assert!((result.angle).abs() < 0.01);
}

#[test]
fn off_route_returns_raw_fix() {
    let engine = SnapEngine::default();
    let polylines = parallel_polylines();
    // about 200 m east of both lines
    let fix = Coordinate::new(37.004, 127.0025);
    let result = engine.snap(&fix, Some(Direction::Outbound), &polylines, SnapHints::default());
    assert!(!result.snapped);
    assert_eq!(result.position, fix);
    assert_eq!(result.direction, Some(Direction::Outbound));
    assert_eq!(result.segment_index, 0);
    assert!(result.distance.as_meters() > 150.0);

    let result = engine.snap(&fix, None, &polylines, SnapHints::default());
    assert_eq!(result.direction, None);
}

#[test]
fn windowed_miss_retries_full_scan() {
    let engine = SnapEngine::new(SnapConfig {
        search_radius: 1,
        ..Default::default()
    });
    let polylines = parallel_polylines();
    let fix = polylines.outbound[18];
    let hints = SnapHints {
        outbound: Some(0),
        inbound: None,
    };
    let result = engine.snap(&fix, Some(Direction::Outbound), &polylines, hints);
    assert!(result.snapped);
    assert!(result.segment_index >= 17);
    assert!(result.distance.as_meters() < 0.01);
}

#[test]
fn empty_polylines_never_snap() {
    let engine = SnapEngine::default();
    let fix = Coordinate::new(37.0, 127.0);
    let result = engine.snap(&fix, None, &RoutePolylines::default(), SnapHints::default());
    assert_eq!(result, SnapResult::raw(fix, None));
}
