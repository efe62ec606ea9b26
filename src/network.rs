//! Default endpoint and topic constants for the rearing house feeds.

/// Default MQTT broker (WebSocket transport).
pub const DEFAULT_BROKER_URL: &str = "ws://broker.hivemq.com:8000/mqtt";

/// Default topic carrying temperature readings.
pub const DEFAULT_TEMPERATURE_TOPIC: &str = "farm/temperature";

/// Default topic carrying humidity readings.
pub const DEFAULT_HUMIDITY_TOPIC: &str = "farm/humidity";

/// Default topic device commands are published on.
pub const DEFAULT_COMMAND_TOPIC: &str = "farm/device";
