use std::{collections::HashMap, sync::Arc};

mod entities;
mod shape;
pub use entities::*;
pub use shape::*;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    config::SwapConfig,
    direction::{Direction, RouteStop},
    shared::geo::Coordinate,
    source::{self, RawFeatureCollection, RawRouteDetail, RawRouteMap},
};

type IdToIndex = HashMap<Arc<str>, usize>;
type IdToIndexes = HashMap<Arc<str>, Box<[usize]>>;

const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Immutable, indexed view over the static route data.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    pub stations: Box<[Station]>,
    pub variants: Box<[RouteVariant]>,
    pub shapes: Box<[RouteShape]>,
    /// When the route map was generated, if it says so.
    pub last_updated: Option<NaiveDateTime>,

    station_lookup: Arc<IdToIndex>,
    variant_lookup: Arc<IdToIndex>,
    route_to_variants: Arc<IdToIndexes>,
    shape_lookup: Arc<IdToIndex>,
}

impl Repository {
    pub fn new() -> Self {
        Default::default()
    }

    /// Loads everything the source holds.
    /// Shapes are prepared in parallel, this can take a while for a large network.
    pub fn with_source(
        self,
        source: &source::Source,
        config: &SwapConfig,
    ) -> Result<Self, source::Error> {
        let route_map = source.route_map()?;
        let mut geometries: Vec<RawFeatureCollection> = Vec::new();
        source.stream_geometries(|(_, collection)| geometries.push(collection))?;
        Ok(self.with_data(route_map, geometries, config))
    }

    /// Builds the repository from already parsed pipeline output.
    pub fn with_data(
        mut self,
        route_map: RawRouteMap,
        geometries: Vec<RawFeatureCollection>,
        config: &SwapConfig,
    ) -> Self {
        self.last_updated = route_map
            .last_updated
            .as_deref()
            .and_then(|value| NaiveDateTime::parse_from_str(value, LAST_UPDATED_FORMAT).ok());

        info!("Loading stations...");
        let mut station_ids: Vec<&String> = route_map.stations.keys().collect();
        station_ids.sort();
        let mut station_lookup: IdToIndex = HashMap::new();
        let stations: Vec<Station> = station_ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let raw = &route_map.stations[id];
                let station = Station {
                    index: i as u32,
                    id: id.trim().into(),
                    name: raw.nodenm.as_str().into(),
                    number: raw.nodeno.as_str().into(),
                    coordinate: Coordinate::new(raw.gpslati, raw.gpslong),
                };
                station_lookup.insert(station.id.clone(), i);
                station
            })
            .collect();
        self.stations = stations.into();
        self.station_lookup = station_lookup.into();
        info!("Loaded {} stations", self.stations.len());

        info!("Loading route variants...");
        let mut variant_lookup: IdToIndex = HashMap::new();
        let mut route_to_variants: HashMap<Arc<str>, Vec<usize>> = HashMap::new();
        let mut variants: Vec<RouteVariant> = Vec::new();
        for (route_name, id, detail) in ordered_details(&route_map) {
            if variant_lookup.contains_key(id.trim()) {
                continue;
            }
            let index = variants.len();
            let route_name: Arc<str> = if detail.routeno.is_empty() {
                route_name.trim().into()
            } else {
                detail.routeno.as_str().into()
            };
            let variant = RouteVariant {
                index: index as u32,
                id: id.trim().into(),
                route_name: route_name.clone(),
                stops: sequence_to_stops(id, detail).into(),
            };
            variant_lookup.insert(variant.id.clone(), index);
            route_to_variants.entry(route_name).or_default().push(index);
            variants.push(variant);
        }
        self.variants = variants.into();
        self.variant_lookup = variant_lookup.into();
        let route_to_variants: IdToIndexes = route_to_variants
            .into_iter()
            .map(|(key, value)| (key, value.into()))
            .collect();
        self.route_to_variants = route_to_variants.into();
        info!("Loaded {} route variants", self.variants.len());

        info!("Preparing route shapes...");
        let features: Vec<_> = geometries
            .into_iter()
            .flat_map(|collection| collection.features)
            .collect();
        let shapes: Vec<RouteShape> = features
            .into_par_iter()
            .filter_map(|feature| {
                let fallback = self
                    .variant_by_id(&feature.properties.route_id)
                    .map(|variant| &variant.stops[..]);
                RouteShape::from_feature(
                    feature,
                    fallback,
                    |stop_id| self.station_by_id(stop_id).map(|s| s.coordinate),
                    config,
                )
            })
            .collect();

        let mut shape_lookup: IdToIndex = HashMap::new();
        let mut unique: Vec<RouteShape> = Vec::with_capacity(shapes.len());
        for mut shape in shapes {
            if shape_lookup.contains_key(&shape.variant_id) {
                warn!("Duplicate geometry for route variant {}", shape.variant_id);
                continue;
            }
            let index = unique.len();
            shape.index = index as u32;
            if shape.route_name.is_empty()
                && let Some(name) = self.route_name_by_variant_id(&shape.variant_id)
            {
                shape.route_name = name.into();
            }
            shape_lookup.insert(shape.variant_id.clone(), index);
            unique.push(shape);
        }
        let shapes = unique;
        let swapped = shapes.iter().filter(|shape| shape.swapped).count();
        self.shapes = shapes.into();
        self.shape_lookup = shape_lookup.into();
        info!(
            "Prepared {} route shapes, {swapped} with swapped directions",
            self.shapes.len()
        );
        self
    }

    /// Get a station with the given id.
    /// If no station is found with the given id None is returned.
    pub fn station_by_id(&self, id: &str) -> Option<&Station> {
        let index = self.station_lookup.get(id.trim())?;
        Some(&self.stations[*index])
    }

    pub fn variant_by_id(&self, id: &str) -> Option<&RouteVariant> {
        let index = self.variant_lookup.get(id.trim())?;
        Some(&self.variants[*index])
    }

    /// Returns every variant published under a route name, in route map order.
    /// If the route name is unknown None is returned.
    pub fn variants_by_route_name(&self, route_name: &str) -> Option<Vec<&RouteVariant>> {
        let indexes = self.route_to_variants.get(route_name.trim())?;
        Some(indexes.iter().map(|index| &self.variants[*index]).collect())
    }

    pub fn shape_by_variant_id(&self, variant_id: &str) -> Option<&RouteShape> {
        let index = self.shape_lookup.get(variant_id.trim())?;
        Some(&self.shapes[*index])
    }

    /// Every shape published under a route name. Variants without geometry are skipped.
    pub fn shapes_by_route_name(&self, route_name: &str) -> Vec<&RouteShape> {
        self.variants_by_route_name(route_name)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|variant| self.shape_by_variant_id(&variant.id))
            .collect()
    }

    pub fn route_name_by_variant_id(&self, variant_id: &str) -> Option<&str> {
        self.variant_by_id(variant_id)
            .map(|variant| variant.route_name.as_ref())
    }

    /// All route names, sorted.
    pub fn route_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .route_to_variants
            .keys()
            .map(|name| name.as_ref())
            .collect();
        names.sort();
        names
    }
}

/// Walks the route details in route number order, listed variants first, then any
/// detail the number index does not mention.
fn ordered_details(route_map: &RawRouteMap) -> Vec<(&str, &str, &RawRouteDetail)> {
    let mut ordered: Vec<(&str, &str, &RawRouteDetail)> = route_map
        .route_numbers
        .iter()
        .flat_map(|(route_name, ids)| {
            ids.iter().filter_map(move |id| {
                let detail = route_map.route_details.get(id)?;
                Some((route_name.as_str(), id.as_str(), detail))
            })
        })
        .collect();
    let mut unlisted: Vec<(&str, &str, &RawRouteDetail)> = route_map
        .route_details
        .iter()
        .filter(|(id, _)| {
            !route_map
                .route_numbers
                .values()
                .any(|ids| ids.contains(*id))
        })
        .map(|(id, detail)| (detail.routeno.as_str(), id.as_str(), detail))
        .collect();
    unlisted.sort_by_key(|(_, id, _)| *id);
    ordered.extend(unlisted);
    ordered
}

fn sequence_to_stops(variant_id: &str, detail: &RawRouteDetail) -> Vec<RouteStop> {
    let mut stops: Vec<RouteStop> = detail
        .sequence
        .iter()
        .filter_map(|entry| {
            let direction = entry.updowncd.and_then(Direction::from_code);
            let order = u32::try_from(entry.nodeord).ok();
            match (direction, order) {
                (Some(direction), Some(order)) => Some(RouteStop {
                    stop_id: entry.nodeid.trim().into(),
                    order,
                    direction,
                }),
                _ => {
                    warn!(
                        "Route variant {variant_id}: skipping stop {} with order {} and direction {:?}",
                        entry.nodeid, entry.nodeord, entry.updowncd
                    );
                    None
                }
            }
        })
        .collect();
    stops.sort_by_key(|stop| stop.order);
    stops
}

#[cfg(test)]
fn sample_route_map() -> RawRouteMap {
    serde_json::from_str(
        r#"{
            "lastUpdated": "2025-03-01 04:00:00",
            "route_numbers": { "34": ["V2", "V1"], "7": ["V7"] },
            "route_details": {
                "V1": { "routeno": "34", "sequence": [
                    { "nodeid": "b", "nodeord": 2, "updowncd": 0 },
                    { "nodeid": "a", "nodeord": 1, "updowncd": 0 }
                ] },
                "V2": { "routeno": "34", "sequence": [
                    { "nodeid": "a", "nodeord": 1, "updowncd": 1 },
                    { "nodeid": "x", "nodeord": 2, "updowncd": 7 }
                ] },
                "V7": { "routeno": "7", "sequence": [] },
                "V9": { "routeno": "9", "sequence": [] }
            },
            "stations": {
                "a": { "nodenm": "A", "nodeno": "1", "gpslati": 37.0, "gpslong": 127.0 },
                "b": { "nodenm": "B", "nodeno": "2", "gpslati": 37.001, "gpslong": 127.0 }
            }
        }"#,
    )
    .unwrap()
}

#[test]
fn variants_keep_route_map_order() {
    let repository = Repository::new().with_data(sample_route_map(), vec![], &SwapConfig::default());
    let ids: Vec<&str> = repository
        .variants_by_route_name("34")
        .unwrap()
        .iter()
        .map(|variant| variant.id.as_ref())
        .collect();
    assert_eq!(ids, vec!["V2", "V1"]);
    assert_eq!(repository.route_names(), vec!["34", "7", "9"]);
    assert!(repository.last_updated.is_some());
}

#[test]
fn invalid_sequence_entries_are_dropped_and_sorted() {
    let repository = Repository::new().with_data(sample_route_map(), vec![], &SwapConfig::default());
    let v1 = repository.variant_by_id("V1").unwrap();
    let orders: Vec<u32> = v1.stops.iter().map(|stop| stop.order).collect();
    assert_eq!(orders, vec![1, 2]);
    assert_eq!(repository.variant_by_id("V2").unwrap().stops.len(), 1);
    assert!(v1.serves("b"));
    assert_eq!(
        repository.station_by_id(" b ").map(|s| s.coordinate),
        Some(Coordinate::new(37.001, 127.0))
    );
    assert_eq!(repository.route_name_by_variant_id("V9"), Some("9"));
    assert!(repository.shape_by_variant_id("V1").is_none());
}
