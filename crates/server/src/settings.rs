use std::{env, fs, io, path::PathBuf, time::Duration};

use snapline::Config;
use thiserror::Error;

use crate::fetch::RetryPolicy;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("No static data, pass a data path or set STATIC_BASE_URL")]
    MissingStaticData,
}

/// Process settings: positional args, environment and an optional engine config file.
///
/// `snapline-server [DATA_PATH] [CONFIG_JSON]`, where `DATA_PATH` is a directory or zip
/// holding `routeMap.json` and `derived_routes/`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub static_path: Option<PathBuf>,
    pub static_base_url: Option<String>,
    pub live_api_url: Option<String>,
    pub service_key: String,
    pub city_code: String,
    pub initial_route: Option<String>,
    pub poll_interval: Duration,
    pub frame_interval: Duration,
    pub cache_capacity: usize,
    pub retry: RetryPolicy,
    pub engine: Config,
}

impl Settings {
    pub fn from_env(args: &[String]) -> Result<Self, SettingsError> {
        let static_path = args.get(1).map(PathBuf::from);
        let static_base_url = var("STATIC_BASE_URL");
        if static_path.is_none() && static_base_url.is_none() {
            return Err(SettingsError::MissingStaticData);
        }
        let engine = match args.get(2) {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => Config::default(),
        };
        Ok(Self {
            static_path,
            static_base_url,
            live_api_url: var("LIVE_API_URL"),
            service_key: var("SERVICE_KEY").unwrap_or_default(),
            city_code: var("CITY_CODE").unwrap_or_default(),
            initial_route: var("ROUTE"),
            poll_interval: interval("POLL_INTERVAL_MS", 10_000)?,
            frame_interval: interval("FRAME_INTERVAL_MS", 16)?,
            cache_capacity: number("CACHE_CAPACITY", 64)? as usize,
            retry: RetryPolicy {
                retries: number("FETCH_RETRIES", 2)? as u32,
                delay: Duration::from_millis(number("FETCH_RETRY_DELAY_MS", 500)?),
            },
            engine,
        })
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn number(name: &'static str, default: u64) -> Result<u64, SettingsError> {
    parse_number(name, var(name), default)
}

/// A loop period in milliseconds. Zero is rejected, tokio intervals need a period.
fn interval(name: &'static str, default: u64) -> Result<Duration, SettingsError> {
    parse_interval(name, var(name), default)
}

fn parse_number(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<u64, SettingsError> {
    match value {
        Some(value) => value
            .parse()
            .map_err(|_| SettingsError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_interval(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, SettingsError> {
    match parse_number(name, value, default)? {
        0 => Err(SettingsError::Invalid {
            name,
            value: "0".to_string(),
        }),
        millis => Ok(Duration::from_millis(millis)),
    }
}

#[test]
fn zero_interval_is_rejected() {
    let result = parse_interval("FRAME_INTERVAL_MS", Some("0".to_string()), 16);
    assert!(matches!(
        result,
        Err(SettingsError::Invalid {
            name: "FRAME_INTERVAL_MS",
            ..
        })
    ));
    assert!(parse_interval("POLL_INTERVAL_MS", Some("000".to_string()), 10_000).is_err());
}

#[test]
fn interval_defaults_and_parses() {
    assert_eq!(
        parse_interval("POLL_INTERVAL_MS", None, 10_000).unwrap(),
        Duration::from_millis(10_000)
    );
    assert_eq!(
        parse_interval("POLL_INTERVAL_MS", Some("2500".to_string()), 10_000).unwrap(),
        Duration::from_millis(2500)
    );
    assert!(parse_interval("POLL_INTERVAL_MS", Some("soon".to_string()), 10_000).is_err());
    assert!(parse_interval("POLL_INTERVAL_MS", Some("-5".to_string()), 10_000).is_err());
}
