use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::geo::Distance;

/// Every tunable of the engine. All fields fall back to their defaults when missing
/// from a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub snap: SnapConfig,
    pub motion: MotionConfig,
    pub swap: SwapConfig,
    pub direction: DirectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Projections further than this from the raw fix are not trusted.
    pub validity_threshold: Distance,
    /// Segments searched on each side of a stop based hint.
    pub search_radius: usize,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            validity_threshold: Distance::from_meters(50.0),
            search_radius: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Default length of one animation, regardless of how many segments it spans.
    #[serde(with = "millis")]
    pub duration: Duration,
    /// Minimum gap between two emitted intermediate states.
    #[serde(with = "millis")]
    pub throttle: Duration,
    /// Backward moves up to this distance are treated as GPS noise and ignored.
    pub jitter_tolerance: Distance,
    /// In-segment offset difference below which two projections count as level.
    pub offset_epsilon: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(4_000),
            throttle: Duration::from_millis(50),
            jitter_tolerance: Distance::from_meters(12.0),
            offset_epsilon: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Maximum stops sampled per direction.
    pub sample_cap: usize,
    /// The opposite polyline must fit at most this fraction of the labeled one's error.
    pub ratio: f64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            sample_cap: 24,
            ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionConfig {
    /// Stops that always resolve to outbound, whatever the sequence data says.
    pub always_outbound: Vec<String>,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[test]
fn partial_config_keeps_defaults() {
    let config: Config =
        serde_json::from_str(r#"{ "motion": { "duration": 1500 }, "snap": { "validity_threshold": 80.0 } }"#)
            .unwrap();
    assert_eq!(config.motion.duration, Duration::from_millis(1_500));
    assert_eq!(config.motion.throttle, Duration::from_millis(50));
    assert_eq!(config.snap.validity_threshold, Distance::from_meters(80.0));
    assert_eq!(config.snap.search_radius, 30);
    assert!(config.direction.always_outbound.is_empty());
}
