//! # Silkworm Telemetry
//!
//! Telemetry core for a silkworm rearing dashboard: ingests temperature and
//! humidity samples from a push (MQTT) or pull (HTTP) feed, merges them into
//! complete points, keeps a bounded trend history, classifies the environment
//! against rearing thresholds, and sends actuator commands back.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: samples, merged points, history, status evaluation, device
//!    commands (always available, no I/O)
//! 2. **HTTP**: `DataServiceHttp` with per-request retry policies
//! 3. **Transport**: push feed over `rumqttc`, pull feed over HTTP, and an
//!    in-process manual feed, behind one `Transport` type
//! 4. **Session**: `TelemetrySession`, a single task owning all state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use silkworm_telemetry::prelude::*;
//!
//! let mut session = TelemetrySession::builder()
//!     .broker_url("ws://broker.hivemq.com:8000/mqtt")
//!     .instar_stage(InstarStage::Fourth)
//!     .build()?;
//!
//! let now = session.current_values();
//! let report = session.status();
//! session.dispatch("FAN", Action::On)?;
//! session.shutdown().await;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Configuration with JSON loading and validation.
pub mod config;

/// Unified telemetry error types.
pub mod error;

/// Default endpoint and topic constants.
pub mod network;

// ── Layer 2: HTTP ────────────────────────────────────────────────────────────

/// HTTP client with retry policies.
#[cfg(feature = "http")]
pub mod http;

// ── Layer 3: Transport ───────────────────────────────────────────────────────

/// Feed transports: events, ready state, command publishing.
pub mod transport;

// ── Layer 4: Session ─────────────────────────────────────────────────────────

/// `TelemetrySession` — the primary entry point.
pub mod session;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{DeviceId, MetricKind};

    // Domain types
    pub use crate::domain::device::{default_devices, Action, CommandDispatcher, Device, DeviceCommand};
    pub use crate::domain::reading::{CurrentValues, HistoryBuffer, MergedPoint, StreamMerger, TelemetryState};
    pub use crate::domain::sample::Sample;
    pub use crate::domain::status::{
        evaluate, Alert, Deviation, InstarStage, MetricStatus, Range, Severity, StatusReport,
        Thresholds,
    };

    // Configuration
    pub use crate::config::{FeedConfig, PollConfig, PollEndpoint, SeedValues, TelemetryConfig, TransportMode};

    // Errors
    pub use crate::error::{
        ConfigError, DispatchError, FeedError, HttpError, SampleError, TelemetryError,
    };

    // Network
    pub use crate::network::{DEFAULT_BROKER_URL, DEFAULT_COMMAND_TOPIC};

    // HTTP retry
    #[cfg(feature = "http")]
    pub use crate::http::retry::{RetryConfig, RetryPolicy};

    // Transport
    pub use crate::transport::{
        CommandSink, ManualFeed, ManualHandle, ReadyState, Transport, TransportEvent,
    };
    #[cfg(feature = "mqtt")]
    pub use crate::transport::mqtt::MqttFeed;
    #[cfg(feature = "http")]
    pub use crate::transport::poll::PollFeed;

    // Session
    pub use crate::session::{TelemetrySession, TelemetrySessionBuilder, TelemetrySnapshot};
}
