use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use crate::{
    config::SwapConfig,
    direction::{Direction, RouteStop},
    polyline::{
        BoundingBox, Polyline, RoutePolylines, StopIndexMap, clamp_turn_index,
        derive_turn_index, split_by_turn_index,
    },
    shared::geo::{Coordinate, Distance},
    source::RawFeature,
    swap,
};

/// A route variant's geometry, prepared for snapping.
#[derive(Debug, Clone, Default)]
pub struct RouteShape {
    pub index: u32,
    pub variant_id: Arc<str>,
    pub route_name: Arc<str>,
    /// The full raw geometry, lat-first.
    pub coordinates: Polyline,
    /// Directed halves, already corrected when `swapped` is set.
    pub polylines: RoutePolylines,
    /// Clamped index of the raw coordinate where outbound ends and inbound begins.
    pub turn_index: Option<usize>,
    pub stops: Box<[RouteStop]>,
    pub stop_index: StopIndexMap,
    /// Set when the labeled halves were found to be reversed and exchanged.
    pub swapped: bool,
    pub bounding_box: Option<BoundingBox>,
    pub total_length: Distance,
    pub source_version: Option<DateTime<FixedOffset>>,
}

impl RouteShape {
    /// Builds a shape from one pipeline feature.
    ///
    /// `fallback_stops` is used when the feature carries no stop list of its own, and
    /// `station_coordinate` feeds the swap check. Returns None for a feature without
    /// any coordinates.
    pub fn from_feature<F>(
        feature: RawFeature,
        fallback_stops: Option<&[RouteStop]>,
        station_coordinate: F,
        config: &SwapConfig,
    ) -> Option<Self>
    where
        F: Fn(&str) -> Option<Coordinate>,
    {
        let properties = feature.properties;
        let variant_id: Arc<str> = properties.route_id.trim().into();
        let coordinates: Polyline = feature
            .geometry
            .coordinates
            .iter()
            .copied()
            .map(Coordinate::from_lon_lat)
            .collect();
        if coordinates.is_empty() {
            warn!("Route variant {variant_id} has no geometry");
            return None;
        }

        // each stop keeps its own `stop_to_coord` entry, even when a neighbour is dropped
        let stop_to_coord = &properties.indices.stop_to_coord;
        let mut stops = Vec::with_capacity(properties.stops.len());
        let mut placed_stops = Vec::with_capacity(properties.stops.len());
        let mut placed_coords = Vec::with_capacity(properties.stops.len());
        for (position, raw) in properties.stops.iter().enumerate() {
            let (Ok(order), Some(direction)) =
                (u32::try_from(raw.ord), Direction::from_code(raw.up_down))
            else {
                continue;
            };
            let stop = RouteStop {
                stop_id: raw.id.trim().into(),
                order,
                direction,
            };
            if let Some(&coord_index) = stop_to_coord.get(position) {
                placed_stops.push(stop.clone());
                placed_coords.push(coord_index);
            }
            stops.push(stop);
        }
        if stops.len() != properties.stops.len() {
            warn!(
                "Route variant {variant_id}: dropped {} stops with invalid order or direction",
                properties.stops.len() - stops.len()
            );
        }
        // fallback stops come from the route map and have no place in this geometry
        if stops.is_empty()
            && let Some(fallback) = fallback_stops
        {
            stops = fallback.to_vec();
        }

        let turn_index = properties
            .indices
            .turn_idx
            .or_else(|| derive_turn_index(&placed_stops, &placed_coords))
            .and_then(|turn| clamp_turn_index(turn, coordinates.len()));
        let stop_index = StopIndexMap::build(&placed_stops, &placed_coords, coordinates.len());

        let polylines = split_by_turn_index(&coordinates, turn_index);
        let evidence: Vec<(Coordinate, Direction)> = stops
            .iter()
            .filter_map(|stop| Some((station_coordinate(&stop.stop_id)?, stop.direction)))
            .collect();
        let swapped = swap::needs_swap(&evidence, &polylines, config);
        if swapped {
            debug!("Route variant {variant_id}: swapping outbound and inbound");
        }
        let polylines = if swapped {
            polylines.swapped()
        } else {
            polylines
        };

        let bounding_box = feature
            .bbox
            .as_deref()
            .and_then(BoundingBox::from_geojson)
            .or_else(|| coordinates.bounding_box());
        let total_length = properties
            .meta
            .total_dist
            .map(Distance::from_meters)
            .unwrap_or_else(|| coordinates.length());
        let source_version = properties
            .meta
            .source_ver
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok());

        Some(Self {
            index: 0,
            variant_id,
            route_name: properties.route_no.trim().into(),
            coordinates,
            polylines,
            turn_index,
            stops: stops.into(),
            stop_index,
            swapped,
            bounding_box,
            total_length,
            source_version,
        })
    }

    /// Maps a raw coordinate index onto a segment hint for the `direction` polyline.
    ///
    /// The outbound half starts at raw index 0 and the inbound half at the turn index;
    /// after a swap each direction reads from the other half. Indexes that fall outside
    /// the half give None, there is no plausible window to search in that case.
    pub fn segment_hint(&self, raw_index: usize, direction: Direction) -> Option<usize> {
        let polyline = self.polylines.get(direction);
        if polyline.is_degenerate() {
            return None;
        }
        let half = if self.swapped {
            direction.opposite()
        } else {
            direction
        };
        let local = match (half, self.turn_index) {
            (Direction::Outbound, None) => raw_index,
            (Direction::Inbound, None) => return None,
            (Direction::Outbound, Some(turn)) => (raw_index <= turn).then_some(raw_index)?,
            (Direction::Inbound, Some(turn)) => raw_index.checked_sub(turn)?,
        };
        Some(local.min(polyline.segment_count() - 1))
    }

    pub fn polyline(&self, direction: Direction) -> &Polyline {
        self.polylines.get(direction)
    }
}

#[cfg(test)]
fn feature(json: &str) -> RawFeature {
    serde_json::from_str(json).unwrap()
}

#[cfg(test)]
const LOOP_FEATURE: &str = r#"{
    "type": "Feature",
    "id": "V1",
    "geometry": { "type": "LineString", "coordinates": [
        [127.0, 37.0], [127.0, 37.001], [127.0, 37.002], [127.001, 37.002],
        [127.001, 37.001], [127.001, 37.0]
    ] },
    "properties": {
        "route_id": "V1",
        "route_no": "34",
        "stops": [
            { "id": "a", "name": "A", "ord": 1, "up_down": 1 },
            { "id": "b", "name": "B", "ord": 2, "up_down": 1 },
            { "id": "c", "name": "C", "ord": 3, "up_down": 0 },
            { "id": "d", "name": "D", "ord": 4, "up_down": 0 }
        ],
        "indices": { "stop_to_coord": [0, 2, 4, 5] },
        "meta": { "source_ver": "2025-03-01T04:00:00+09:00" }
    }
}"#;

#[test]
fn turn_is_derived_from_stop_directions() {
    let shape =
        RouteShape::from_feature(feature(LOOP_FEATURE), None, |_| None, &SwapConfig::default())
            .unwrap();
    assert_eq!(shape.turn_index, Some(2));
    assert_eq!(shape.polylines.outbound.len(), 3);
    assert_eq!(shape.polylines.inbound.len(), 4);
    assert!(!shape.swapped);
    assert_eq!(shape.route_name.as_ref(), "34");
    assert_eq!(shape.coordinates[1], Coordinate::new(37.001, 127.0));
    assert!(shape.source_version.is_some());
    assert!(shape.total_length.as_meters() > 400.0);
}

#[test]
fn segment_hint_follows_turn_and_swap() {
    let mut shape =
        RouteShape::from_feature(feature(LOOP_FEATURE), None, |_| None, &SwapConfig::default())
            .unwrap();
    assert_eq!(shape.segment_hint(1, Direction::Outbound), Some(1));
    assert_eq!(shape.segment_hint(4, Direction::Outbound), None);
    assert_eq!(shape.segment_hint(4, Direction::Inbound), Some(2));
    // the last vertex clamps onto the last segment
    assert_eq!(shape.segment_hint(5, Direction::Inbound), Some(2));

    shape.polylines = shape.polylines.clone().swapped();
    shape.swapped = true;
    assert_eq!(shape.segment_hint(4, Direction::Outbound), Some(2));
    assert_eq!(shape.segment_hint(1, Direction::Inbound), Some(1));
}

#[test]
fn reversed_labels_are_swapped() {
    // stations sit on the opposite half of the one their direction code claims
    let station = |id: &str| match id {
        "a" => Some(Coordinate::new(37.0, 127.001)),
        "b" => Some(Coordinate::new(37.0015, 127.001)),
        "c" => Some(Coordinate::new(37.0005, 127.0)),
        "d" => Some(Coordinate::new(37.0015, 127.0)),
        _ => None,
    };
    let shape =
        RouteShape::from_feature(feature(LOOP_FEATURE), None, station, &SwapConfig::default())
            .unwrap();
    assert!(shape.swapped);
    assert_eq!(shape.polylines.outbound[0], Coordinate::new(37.002, 127.0));
}

#[test]
fn invalid_stop_keeps_neighbours_aligned() {
    let json = r#"{
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": [
            [127.0, 37.0], [127.0, 37.001], [127.0, 37.002], [127.0, 37.003],
            [127.001, 37.003], [127.001, 37.002], [127.001, 37.001], [127.001, 37.0]
        ] },
        "properties": {
            "route_id": "V2",
            "route_no": "34",
            "stops": [
                { "id": "a", "name": "A", "ord": 1, "up_down": 1 },
                { "id": "x", "name": "X", "ord": 2, "up_down": 7 },
                { "id": "b", "name": "B", "ord": 3, "up_down": 1 },
                { "id": "c", "name": "C", "ord": 4, "up_down": 0 }
            ],
            "indices": { "stop_to_coord": [0, 1, 3, 6] }
        }
    }"#;
    let shape =
        RouteShape::from_feature(feature(json), None, |_| None, &SwapConfig::default()).unwrap();
    assert_eq!(shape.stops.len(), 3);
    assert_eq!(shape.stop_index.by_id("a"), Some(0));
    assert_eq!(shape.stop_index.by_id("x"), None);
    assert_eq!(shape.stop_index.by_id("b"), Some(3));
    assert_eq!(shape.stop_index.by_id("c"), Some(6));
    assert_eq!(shape.stop_index.by_order(3), Some(3));
    assert_eq!(shape.turn_index, Some(3));
    assert_eq!(shape.polylines.outbound.len(), 4);
    assert_eq!(shape.polylines.inbound.len(), 5);
}

#[test]
fn fallback_stops_are_not_placed_on_the_geometry() {
    let json = r#"{
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": [
            [127.0, 37.0], [127.0, 37.001], [127.0, 37.002], [127.0, 37.003]
        ] },
        "properties": {
            "route_id": "V3",
            "route_no": "34",
            "stops": [],
            "indices": { "stop_to_coord": [0, 3] }
        }
    }"#;
    let fallback = [
        RouteStop {
            stop_id: "a".into(),
            order: 1,
            direction: Direction::Outbound,
        },
        RouteStop {
            stop_id: "b".into(),
            order: 2,
            direction: Direction::Inbound,
        },
    ];
    let shape = RouteShape::from_feature(
        feature(json),
        Some(&fallback),
        |_| None,
        &SwapConfig::default(),
    )
    .unwrap();
    assert_eq!(shape.stops.len(), 2);
    assert!(shape.stop_index.is_empty());
    assert_eq!(shape.turn_index, None);
    assert!(shape.polylines.inbound.is_empty());
}
