//! Live vehicle locations from a TAGO style bus location API.

use chrono::NaiveDateTime;
use reqwest::Client;
use serde_json::Value;
use snapline::{
    prelude::*,
    source::{f64_from_value, i64_from_value, string_from_value},
};

use crate::fetch::{FetchError, RetryPolicy, fetch_json};

const LOCATIONS_ENDPOINT: &str = "getRouteAcctoBusLcList";

pub struct LiveClient {
    client: Client,
    base_url: String,
    service_key: String,
    city_code: String,
    policy: RetryPolicy,
}

impl LiveClient {
    pub fn new(
        client: Client,
        base_url: &str,
        service_key: &str,
        city_code: &str,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            city_code: city_code.to_string(),
            policy,
        }
    }

    /// Every vehicle currently reported on one route variant.
    pub async fn vehicles(&self, variant_id: &str) -> Result<Vec<VehicleFix>, FetchError> {
        let url = format!("{}/{LOCATIONS_ENDPOINT}", self.base_url);
        let query = [
            ("cityCode", self.city_code.as_str()),
            ("routeId", variant_id),
            ("serviceKey", self.service_key.as_str()),
            ("numOfRows", "200"),
            ("_type", "json"),
        ];
        let body: Value = fetch_json(&self.client, &url, &query, &self.policy).await?;
        let observed_at = chrono::Local::now().naive_local();
        Ok(parse_vehicles(&body, variant_id, observed_at))
    }
}

/// `response.body.items.item` holds an object for one result, an array for several and
/// an empty string for none.
pub fn extract_items(body: &Value) -> Vec<&Value> {
    match &body["response"]["body"]["items"]["item"] {
        Value::Array(items) => items.iter().collect(),
        item @ Value::Object(_) => vec![item],
        _ => Vec::new(),
    }
}

/// Parses every item with a vehicle number and a usable position.
pub fn parse_vehicles(
    body: &Value,
    variant_id: &str,
    observed_at: NaiveDateTime,
) -> Vec<VehicleFix> {
    extract_items(body)
        .into_iter()
        .filter_map(|item| {
            let vehicle_id = string_from_value(&item["vehicleno"]);
            let latitude = f64_from_value(&item["gpslati"])?;
            let longitude = f64_from_value(&item["gpslong"])?;
            if vehicle_id.is_empty() || !latitude.is_finite() || !longitude.is_finite() {
                return None;
            }
            let mut fix = VehicleFix::new(&vehicle_id, Coordinate::new(latitude, longitude))
                .on_variant(variant_id)
                .observed_at(observed_at);
            let stop_id = string_from_value(&item["nodeid"]);
            if !stop_id.is_empty() {
                let order = i64_from_value(&item["nodeord"])
                    .and_then(|order| u32::try_from(order).ok());
                fix = fix.at_stop(&stop_id, order);
            }
            Some(fix)
        })
        .collect()
}

#[cfg(test)]
fn now() -> NaiveDateTime {
    chrono::DateTime::from_timestamp(1_740_000_000, 0)
        .map(|time| time.naive_utc())
        .unwrap()
}

#[test]
fn single_item_object_is_accepted() {
    let body: Value = serde_json::from_str(
        r#"{ "response": { "body": { "items": { "item": {
            "vehicleno": "70A1234", "gpslati": "37.35", "gpslong": 127.95,
            "nodeid": "WJB251", "nodeord": "12", "routenm": 34
        } } } } }"#,
    )
    .unwrap();
    let fixes = parse_vehicles(&body, "WJB100", now());
    assert_eq!(fixes.len(), 1);
    let fix = &fixes[0];
    assert_eq!(fix.vehicle_id.as_ref(), "70A1234");
    assert_eq!(fix.position, Coordinate::new(37.35, 127.95));
    assert_eq!(fix.stop_id.as_deref(), Some("WJB251"));
    assert_eq!(fix.order, Some(12));
    assert_eq!(fix.variant_id.as_deref(), Some("WJB100"));
}

#[test]
fn empty_and_malformed_items_are_skipped() {
    let empty: Value =
        serde_json::from_str(r#"{ "response": { "body": { "items": "" } } }"#).unwrap();
    assert!(parse_vehicles(&empty, "R", now()).is_empty());

    let body: Value = serde_json::from_str(
        r#"{ "response": { "body": { "items": { "item": [
            { "vehicleno": "A", "gpslati": 37.1, "gpslong": 127.1 },
            { "vehicleno": "", "gpslati": 37.1, "gpslong": 127.1 },
            { "vehicleno": "C", "gpslati": null, "gpslong": 127.1 }
        ] } } } }"#,
    )
    .unwrap();
    let fixes = parse_vehicles(&body, "R", now());
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].stop_id, None);
}
