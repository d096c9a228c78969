use std::{collections::HashMap, sync::Arc};

use tracing::warn;

use crate::{
    direction::{Direction, RouteStop},
    polyline::Polyline,
    shared::geo::Coordinate,
};

/// The two directed halves of a route geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePolylines {
    pub outbound: Polyline,
    pub inbound: Polyline,
}

impl RoutePolylines {
    pub fn get(&self, direction: Direction) -> &Polyline {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }

    /// Exchanges the outbound and inbound labels.
    pub fn swapped(self) -> Self {
        Self {
            outbound: self.inbound,
            inbound: self.outbound,
        }
    }
}

/// Clamps a raw turn index into `[0, len - 1]`. Empty geometry has no turn.
pub fn clamp_turn_index(turn_index: usize, len: usize) -> Option<usize> {
    (len > 0).then(|| turn_index.min(len - 1))
}

/// Splits a raw geometry at its turn point.
///
/// Outbound is `coords[..=turn]` and inbound is `coords[turn..]`, both halves keep the
/// turn point. Geometry without a turn index is treated as one-way: everything is
/// outbound and inbound stays empty.
pub fn split_by_turn_index(coords: &[Coordinate], turn_index: Option<usize>) -> RoutePolylines {
    match turn_index.and_then(|turn| clamp_turn_index(turn, coords.len())) {
        Some(turn) => RoutePolylines {
            outbound: Polyline::from(&coords[..=turn]),
            inbound: Polyline::from(&coords[turn..]),
        },
        None => RoutePolylines {
            outbound: Polyline::from(coords),
            inbound: Polyline::default(),
        },
    }
}

/// Finds the turn from the stop list: the coordinate index of the last stop before the
/// direction code changes. None when the stop list never changes direction.
pub fn derive_turn_index(stops: &[RouteStop], stop_to_coord: &[usize]) -> Option<usize> {
    let turn_stop = stops
        .windows(2)
        .position(|pair| pair[0].direction != pair[1].direction)?;
    stop_to_coord.get(turn_stop).copied()
}

/// Maps stops to their index in the raw geometry.
///
/// Every stop is reachable by id, by id and direction, by sequence order, and by order
/// and direction. Duplicate keys keep the last entry.
#[derive(Debug, Clone, Default)]
pub struct StopIndexMap {
    by_id: HashMap<Arc<str>, usize>,
    by_id_direction: HashMap<Arc<str>, [Option<usize>; 2]>,
    by_order: HashMap<u32, usize>,
    by_order_direction: HashMap<(u32, Direction), usize>,
}

impl StopIndexMap {
    /// `stop_to_coord[i]` is the geometry index of `stops[i]`. Indexes outside of
    /// `coordinate_count` are skipped.
    pub fn build(stops: &[RouteStop], stop_to_coord: &[usize], coordinate_count: usize) -> Self {
        let mut map = Self::default();
        for (stop, coord_index) in stops.iter().zip(stop_to_coord.iter().copied()) {
            if coord_index >= coordinate_count {
                warn!(
                    "Stop {} maps to coordinate {coord_index} outside of {coordinate_count}",
                    stop.stop_id
                );
                continue;
            }
            let id: Arc<str> = stop.stop_id.trim().into();
            map.by_id.insert(id.clone(), coord_index);
            map.by_id_direction.entry(id).or_default()[stop.direction.index()] =
                Some(coord_index);
            map.by_order.insert(stop.order, coord_index);
            map.by_order_direction
                .insert((stop.order, stop.direction), coord_index);
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn by_id(&self, stop_id: &str) -> Option<usize> {
        self.by_id.get(stop_id.trim()).copied()
    }

    pub fn by_id_and_direction(&self, stop_id: &str, direction: Direction) -> Option<usize> {
        self.by_id_direction.get(stop_id.trim())?[direction.index()]
    }

    pub fn by_order(&self, order: u32) -> Option<usize> {
        self.by_order.get(&order).copied()
    }

    pub fn by_order_and_direction(&self, order: u32, direction: Direction) -> Option<usize> {
        self.by_order_direction.get(&(order, direction)).copied()
    }

    /// Tries the most specific key first: order and direction, id and direction,
    /// then order and id alone.
    pub fn lookup(
        &self,
        stop_id: Option<&str>,
        order: Option<u32>,
        direction: Option<Direction>,
    ) -> Option<usize> {
        let with_direction = direction.and_then(|direction| {
            order
                .and_then(|order| self.by_order_and_direction(order, direction))
                .or_else(|| stop_id.and_then(|id| self.by_id_and_direction(id, direction)))
        });
        with_direction
            .or_else(|| order.and_then(|order| self.by_order(order)))
            .or_else(|| stop_id.and_then(|id| self.by_id(id)))
    }
}

#[cfg(test)]
fn line(count: usize) -> Vec<Coordinate> {
    (0..count)
        .map(|i| Coordinate::new(37.0 + i as f64 * 0.001, 127.0))
        .collect()
}

#[cfg(test)]
fn stop(id: &str, order: u32, direction: Direction) -> RouteStop {
    RouteStop {
        stop_id: id.into(),
        order,
        direction,
    }
}

#[test]
fn split_shares_turn_point() {
    let coords = line(6);
    let polylines = split_by_turn_index(&coords, Some(3));
    assert_eq!(polylines.outbound.points(), &coords[..=3]);
    assert_eq!(polylines.inbound.points(), &coords[3..]);
}

#[test]
fn split_without_turn_is_outbound_only() {
    let coords = line(4);
    let polylines = split_by_turn_index(&coords, None);
    assert_eq!(polylines.outbound.points(), &coords[..]);
    assert!(polylines.inbound.is_empty());
}

#[test]
fn split_clamps_turn_index() {
    let coords = line(4);
    let polylines = split_by_turn_index(&coords, Some(99));
    assert_eq!(polylines.outbound.len(), 4);
    assert_eq!(polylines.inbound.points(), &coords[3..]);
    assert_eq!(split_by_turn_index(&[], Some(2)), RoutePolylines::default());
}

#[test]
fn derive_turn_from_direction_change() {
    let stops = vec![
        stop("a", 1, Direction::Outbound),
        stop("b", 2, Direction::Outbound),
        stop("c", 3, Direction::Inbound),
    ];
    assert_eq!(derive_turn_index(&stops, &[0, 7, 12]), Some(7));
    assert_eq!(derive_turn_index(&stops[..2], &[0, 7]), None);
}

#[test]
fn stop_index_last_write_wins() {
    let stops = vec![
        stop("a", 1, Direction::Outbound),
        stop("b", 2, Direction::Outbound),
        stop("a", 9, Direction::Inbound),
        stop("z", 10, Direction::Inbound),
    ];
    let map = StopIndexMap::build(&stops, &[0, 4, 11, 50], 20);
    assert_eq!(map.by_id("a"), Some(11));
    assert_eq!(map.by_id(" a "), Some(11));
    assert_eq!(map.by_id_and_direction("a", Direction::Outbound), Some(0));
    assert_eq!(map.by_order_and_direction(2, Direction::Outbound), Some(4));
    assert_eq!(map.by_order(9), Some(11));
    // out of range coordinate index is dropped
    assert_eq!(map.by_id("z"), None);
    assert_eq!(
        map.lookup(Some("a"), None, Some(Direction::Outbound)),
        Some(0)
    );
    assert_eq!(map.lookup(Some("b"), Some(42), None), Some(4));
}
