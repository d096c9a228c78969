//! Wire shapes of the route pipeline output. Upstream feeds are loose about types, so
//! ids and numbers may arrive either as strings or as JSON numbers.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawRouteMap {
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<String>,
    /// Route number to every route variant id published under it.
    #[serde(default)]
    pub route_numbers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub route_details: HashMap<String, RawRouteDetail>,
    #[serde(default)]
    pub stations: HashMap<String, RawStation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawRouteDetail {
    #[serde(deserialize_with = "flexible_string", default)]
    pub routeno: String,
    #[serde(default)]
    pub sequence: Vec<RawSequenceEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RawSequenceEntry {
    #[serde(deserialize_with = "flexible_string")]
    pub nodeid: String,
    #[serde(deserialize_with = "flexible_i64")]
    pub nodeord: i64,
    #[serde(deserialize_with = "optional_flexible_i64", default)]
    pub updowncd: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawStation {
    #[serde(deserialize_with = "flexible_string", default)]
    pub nodenm: String,
    #[serde(deserialize_with = "flexible_string", default)]
    pub nodeno: String,
    #[serde(deserialize_with = "flexible_f64")]
    pub gpslati: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub gpslong: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawFeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<RawFeature>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RawFeature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "flexible_string", default)]
    pub id: String,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    pub geometry: RawLineString,
    pub properties: RawProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RawLineString {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]` pairs.
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RawProperties {
    #[serde(deserialize_with = "flexible_string")]
    pub route_id: String,
    #[serde(deserialize_with = "flexible_string", default)]
    pub route_no: String,
    #[serde(default)]
    pub stops: Vec<RawFeatureStop>,
    #[serde(default)]
    pub indices: RawIndices,
    #[serde(default)]
    pub meta: RawMeta,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RawFeatureStop {
    #[serde(deserialize_with = "flexible_string")]
    pub id: String,
    #[serde(deserialize_with = "flexible_string", default)]
    pub name: String,
    #[serde(deserialize_with = "flexible_i64")]
    pub ord: i64,
    #[serde(deserialize_with = "flexible_i64")]
    pub up_down: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawIndices {
    #[serde(default)]
    pub turn_idx: Option<usize>,
    #[serde(default)]
    pub stop_to_coord: Vec<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawMeta {
    /// Meters, rounded to one decimal.
    #[serde(default)]
    pub total_dist: Option<f64>,
    /// RFC 3339 fetch time of the stop list the geometry was built from.
    #[serde(default)]
    pub source_ver: Option<String>,
}

/// Renders a scalar as a string. `null` and other non scalars become empty.
pub fn string_from_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

pub fn i64_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn f64_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn flexible_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(|value| string_from_value(&value))
}

pub fn flexible_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    i64_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))
}

pub fn optional_flexible_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Value::deserialize(deserializer).map(|value| i64_from_value(&value))
}

pub fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    f64_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {value}")))
}

#[test]
fn route_map_accepts_mixed_scalar_types() {
    let json = r#"{
        "lastUpdated": "2025-03-01 04:00:00",
        "route_numbers": { "34": ["R1", "R2"] },
        "route_details": {
            "R1": { "routeno": 34, "sequence": [
                { "nodeid": "S1", "nodeord": "1", "updowncd": 0 },
                { "nodeid": "S2", "nodeord": 2, "updowncd": "1" }
            ] }
        },
        "stations": { "S1": { "nodenm": "Terminal", "nodeno": 1001, "gpslati": "37.3", "gpslong": 127.9 } }
    }"#;
    let map: RawRouteMap = serde_json::from_str(json).unwrap();
    let detail = &map.route_details["R1"];
    assert_eq!(detail.routeno, "34");
    assert_eq!(detail.sequence[0].nodeord, 1);
    assert_eq!(detail.sequence[1].updowncd, Some(1));
    assert_eq!(map.stations["S1"].nodeno, "1001");
    assert_eq!(map.stations["S1"].gpslati, 37.3);
}

#[test]
fn missing_direction_code_is_none() {
    let entry: RawSequenceEntry =
        serde_json::from_str(r#"{ "nodeid": "S1", "nodeord": 3 }"#).unwrap();
    assert_eq!(entry.updowncd, None);
    let entry: RawSequenceEntry =
        serde_json::from_str(r#"{ "nodeid": "S1", "nodeord": 3, "updowncd": null }"#).unwrap();
    assert_eq!(entry.updowncd, None);
}
