//! Unified telemetry error types.

use thiserror::Error;

use crate::shared::MetricKind;

/// Top-level telemetry error.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Sample rejected: {0}")]
    Sample(#[from] SampleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// HTTP-layer errors (pull feed, command POST).
#[derive(Error, Debug)]
pub enum HttpError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timeout")]
    Timeout,

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Push feed (MQTT) errors.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Not connected")]
    NotConnected,

    #[error("Already started")]
    AlreadyStarted,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("Invalid broker URL: {0}")]
    InvalidUrl(String),
}

/// Reasons a raw payload never becomes a [`Sample`](crate::domain::sample::Sample).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("missing value")]
    Missing,

    #[error("not a number: {0:?}")]
    NotNumeric(String),

    #[error("non-finite value: {0}")]
    NonFinite(f64),

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("no metric is mapped to topic {0:?}")]
    UnknownTopic(String),
}

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("historyCapacity must be at least 1")]
    ZeroCapacity,

    #[error("pollIntervalMs must be greater than zero")]
    ZeroPollInterval,

    #[error("poll result count must be at least 1")]
    ZeroResults,

    #[error("invalid threshold range for {metric}: [{min}, {max}]")]
    InvalidRange { metric: MetricKind, min: f64, max: f64 },

    #[error("pull mode needs an endpoint URL for {0}")]
    MissingEndpoint(MetricKind),

    #[error("topic for {0} must not be empty")]
    EmptyTopic(String),

    #[error("failed to read config file: {0}")]
    Io(String),
}

/// Outbound command errors. The command is dropped in every case.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("transport not connected")]
    NotConnected,

    #[error("command publishing is not configured for this transport")]
    Unsupported,

    #[error("publish failed: {0}")]
    PublishFailed(String),
}
