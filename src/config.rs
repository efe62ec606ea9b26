//! Telemetry configuration.
//!
//! Every option has a default matching the rearing house deployment, so a
//! config file only needs the keys it overrides:
//!
//! ```json
//! {
//!   "transportMode": "pull",
//!   "pollIntervalMs": 15000,
//!   "historyCapacity": 48,
//!   "thresholds": { "temperature": [24, 28], "humidity": [70, 90] },
//!   "poll": { "results": 10, "temperature": { "url": "https://…/feeds.json", "field": "field1" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::device::{default_devices, Device};
use crate::domain::reading::history::DEFAULT_HISTORY_CAPACITY;
use crate::domain::status::Thresholds;
use crate::error::{ConfigError, TelemetryError};
use crate::network::{
    DEFAULT_BROKER_URL, DEFAULT_COMMAND_TOPIC, DEFAULT_HUMIDITY_TOPIC, DEFAULT_TEMPERATURE_TOPIC,
};
use crate::shared::MetricKind;

/// Which ingestion strategy a deployment uses. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// MQTT subscribe/publish feed.
    #[default]
    Push,
    /// Periodic HTTP fetch of the latest samples.
    Pull,
}

/// Values each metric carries forward before its first observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedValues {
    pub temperature: f64,
    pub humidity: f64,
}

impl Default for SeedValues {
    fn default() -> Self {
        Self {
            temperature: 27.0,
            humidity: 80.0,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryConfig {
    pub transport_mode: TransportMode,
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    pub thresholds: Thresholds,
    pub defaults: SeedValues,
    pub feed: FeedConfig,
    pub poll: PollConfig,
    /// Actuators shown on the device panel. Informational only: commands for
    /// ids outside this list are still dispatched.
    pub devices: Vec<Device>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            transport_mode: TransportMode::default(),
            poll_interval_ms: 15_000,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            thresholds: Thresholds::default(),
            defaults: SeedValues::default(),
            feed: FeedConfig::default(),
            poll: PollConfig::default(),
            devices: default_devices(),
        }
    }
}

impl TelemetryConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, TelemetryError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.thresholds.validate()?;
        match self.transport_mode {
            TransportMode::Push => self.feed.validate(),
            TransportMode::Pull => {
                if self.poll_interval_ms == 0 {
                    return Err(ConfigError::ZeroPollInterval);
                }
                if self.poll.results == 0 {
                    return Err(ConfigError::ZeroResults);
                }
                self.poll.validate()
            }
        }
    }
}

// ─── Push feed ───────────────────────────────────────────────────────────────

/// MQTT feed settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedConfig {
    /// `mqtt://host:port` for TCP, `ws://` / `wss://` for WebSocket.
    pub broker_url: String,
    /// Client id; a random suffix is appended when empty.
    pub client_id: String,
    pub temperature_topic: String,
    pub humidity_topic: String,
    pub command_topic: String,
    pub keep_alive_secs: u64,
    /// Reconnect with exponential backoff after a drop. When `false` a
    /// dropped connection stays `Disconnected`.
    pub reconnect: bool,
    pub base_reconnect_delay_ms: u32,
    pub max_reconnect_attempts: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            client_id: String::new(),
            temperature_topic: DEFAULT_TEMPERATURE_TOPIC.to_string(),
            humidity_topic: DEFAULT_HUMIDITY_TOPIC.to_string(),
            command_topic: DEFAULT_COMMAND_TOPIC.to_string(),
            keep_alive_secs: 30,
            reconnect: true,
            base_reconnect_delay_ms: 1000,
            max_reconnect_attempts: 10,
        }
    }
}

impl FeedConfig {
    pub fn topic(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::Temperature => &self.temperature_topic,
            MetricKind::Humidity => &self.humidity_topic,
        }
    }

    /// Reverse lookup: which metric an inbound topic carries.
    pub fn metric_for_topic(&self, topic: &str) -> Option<MetricKind> {
        MetricKind::ALL.into_iter().find(|k| self.topic(*k) == topic)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, topic) in [
            ("temperatureTopic", &self.temperature_topic),
            ("humidityTopic", &self.humidity_topic),
            ("commandTopic", &self.command_topic),
        ] {
            if topic.trim().is_empty() {
                return Err(ConfigError::EmptyTopic(name.to_string()));
            }
        }
        Ok(())
    }
}

// ─── Pull feed ───────────────────────────────────────────────────────────────

/// One metric's HTTP source. There is no default URL: pull deployments
/// must name their data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollEndpoint {
    pub url: String,
    /// Key of the numeric field inside each feed entry.
    pub field: String,
}

impl Default for PollEndpoint {
    fn default() -> Self {
        Self {
            url: String::new(),
            field: "value".to_string(),
        }
    }
}

/// HTTP data service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollConfig {
    /// Number of most recent entries requested per metric.
    pub results: u32,
    pub temperature: PollEndpoint,
    pub humidity: PollEndpoint,
    /// Where commands are POSTed. Commands are unsupported when unset.
    pub command_url: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            results: 10,
            temperature: PollEndpoint::default(),
            humidity: PollEndpoint::default(),
            command_url: None,
        }
    }
}

impl PollConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for kind in MetricKind::ALL {
            if self.endpoint(kind).url.trim().is_empty() {
                return Err(ConfigError::MissingEndpoint(kind));
            }
        }
        Ok(())
    }

    pub fn endpoint(&self, kind: MetricKind) -> &PollEndpoint {
        match kind {
            MetricKind::Temperature => &self.temperature,
            MetricKind::Humidity => &self.humidity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::Range;

    #[test]
    fn test_defaults_match_deployment() {
        let c = TelemetryConfig::default();
        assert_eq!(c.transport_mode, TransportMode::Push);
        assert_eq!(c.poll_interval(), Duration::from_secs(15));
        assert_eq!(c.history_capacity, 48);
        assert_eq!(c.poll.results, 10);
        assert_eq!(c.feed.topic(MetricKind::Humidity), "farm/humidity");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let c = TelemetryConfig::from_json_str(
            r#"{
                "transportMode": "pull",
                "pollIntervalMs": 5000,
                "historyCapacity": 12,
                "thresholds": {"temperature": [23, 25], "humidity": [70, 75]},
                "poll": {
                    "results": 3,
                    "commandUrl": "http://localhost/cmd",
                    "temperature": {"url": "http://localhost/t.json"},
                    "humidity": {"url": "http://localhost/h.json", "field": "field2"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(c.transport_mode, TransportMode::Pull);
        assert_eq!(c.poll_interval_ms, 5000);
        assert_eq!(c.history_capacity, 12);
        assert_eq!(c.thresholds.temperature, Range::new(23.0, 25.0));
        assert_eq!(c.poll.results, 3);
        assert_eq!(c.poll.command_url.as_deref(), Some("http://localhost/cmd"));
        // untouched keys keep defaults
        assert_eq!(c.poll.temperature.field, "value");
        assert_eq!(c.poll.humidity.field, "field2");
        assert_eq!(c.feed.command_topic, "farm/device");
    }

    #[test]
    fn test_pull_requires_endpoint_urls() {
        let err = TelemetryConfig::from_json_str(r#"{"transportMode": "pull"}"#).unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::Config(ConfigError::MissingEndpoint(MetricKind::Temperature))
        ));

        let err = TelemetryConfig::from_json_str(
            r#"{"transportMode": "pull", "poll": {"temperature": {"url": "http://localhost/t.json"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::Config(ConfigError::MissingEndpoint(MetricKind::Humidity))
        ));

        // push deployments never touch the pull endpoints
        assert!(TelemetryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_single_metric_threshold_override() {
        let c = TelemetryConfig::from_json_str(r#"{"thresholds": {"temperature": [23, 25]}}"#)
            .unwrap();
        assert_eq!(c.thresholds.temperature, Range::new(23.0, 25.0));
        assert_eq!(c.thresholds.humidity, Range::new(70.0, 90.0));
    }

    #[test]
    fn test_metric_for_topic() {
        let feed = FeedConfig::default();
        assert_eq!(feed.metric_for_topic("farm/temperature"), Some(MetricKind::Temperature));
        assert_eq!(feed.metric_for_topic("farm/device"), None);
    }

    #[test]
    fn test_validation_failures() {
        let err = TelemetryConfig::from_json_str(r#"{"historyCapacity": 0}"#).unwrap_err();
        assert!(matches!(err, TelemetryError::Config(ConfigError::ZeroCapacity)));

        let err =
            TelemetryConfig::from_json_str(r#"{"transportMode": "pull", "pollIntervalMs": 0}"#)
                .unwrap_err();
        assert!(matches!(err, TelemetryError::Config(ConfigError::ZeroPollInterval)));

        let err = TelemetryConfig::from_json_str(r#"{"feed": {"humidityTopic": " "}}"#).unwrap_err();
        assert!(matches!(err, TelemetryError::Config(ConfigError::EmptyTopic(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = TelemetryConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, TelemetryError::Config(ConfigError::Io(_))));
    }
}
