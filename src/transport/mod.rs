//! Transport layer — the boundary between the feeds and the telemetry state.
//!
//! One [`Transport`] type with one variant per ingestion strategy, picked by
//! configuration:
//! - `mqtt` feature → [`MqttFeed`](mqtt::MqttFeed), push (subscribe/publish)
//! - `http` feature → [`PollFeed`](poll::PollFeed), pull (periodic fetch)
//! - always → [`ManualFeed`](manual::ManualFeed), in-process injection for
//!   replays and tests
//!
//! Every variant delivers [`TransportEvent`]s into an mpsc channel owned by
//! the session task, and publishes commands through [`CommandSink`].

pub mod manual;

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "http")]
pub mod poll;

use tokio::sync::mpsc;

use crate::config::{TelemetryConfig, TransportMode};
use crate::domain::device::DeviceCommand;
use crate::domain::sample::Sample;
use crate::error::{DispatchError, TelemetryError};

pub use manual::{ManualFeed, ManualHandle};

// ─── Connection state ────────────────────────────────────────────────────────

/// `Disconnected → Connecting → Connected → Disconnected (on drop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl From<u8> for ReadyState {
    fn from(v: u8) -> Self {
        match v {
            1 => ReadyState::Connecting,
            2 => ReadyState::Connected,
            _ => ReadyState::Disconnected,
        }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Events delivered by a transport to its consumer, strictly in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A validated observation.
    Sample(Sample),
    /// Subscriptions (or the poll timer) are active.
    Connected,
    /// Connection lost. Stale values stay visible.
    Disconnected { reason: String },
    /// Reconnection gave up; the transport stays `Disconnected`.
    ReconnectExhausted { attempts: u32 },
}

/// Buffer size of the transport → session event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ─── Publish capability ──────────────────────────────────────────────────────

/// Outbound half of a transport.
///
/// `publish` must not block: it hands the command off and returns. No
/// acknowledgment is awaited.
pub trait CommandSink {
    fn publish(&self, command: &DeviceCommand) -> Result<(), DispatchError>;
}

impl<T: CommandSink + ?Sized> CommandSink for &T {
    fn publish(&self, command: &DeviceCommand) -> Result<(), DispatchError> {
        (**self).publish(command)
    }
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// The configured ingestion strategy.
pub enum Transport {
    #[cfg(feature = "mqtt")]
    Push(mqtt::MqttFeed),
    #[cfg(feature = "http")]
    Pull(poll::PollFeed),
    Manual(ManualFeed),
}

impl Transport {
    /// Build the variant selected by `config.transport_mode`.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        match config.transport_mode {
            #[cfg(feature = "mqtt")]
            TransportMode::Push => Ok(Transport::Push(mqtt::MqttFeed::new(config.feed.clone()))),
            #[cfg(feature = "http")]
            TransportMode::Pull => Ok(Transport::Pull(poll::PollFeed::new(
                config.poll.clone(),
                config.poll_interval(),
            )?)),
            #[allow(unreachable_patterns)]
            mode => Err(TelemetryError::Other(format!(
                "transport mode {:?} is not compiled in",
                mode
            ))),
        }
    }

    /// Begin delivering events into `events`. Returns immediately; the
    /// connection or first fetch happens in a background task.
    pub fn start(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), TelemetryError> {
        match self {
            #[cfg(feature = "mqtt")]
            Transport::Push(feed) => Ok(feed.start(events)?),
            #[cfg(feature = "http")]
            Transport::Pull(feed) => Ok(feed.start(events)?),
            Transport::Manual(feed) => Ok(feed.start(events)?),
        }
    }

    /// Close the connection / stop the timer and wait for background work to end.
    pub async fn stop(&mut self) {
        match self {
            #[cfg(feature = "mqtt")]
            Transport::Push(feed) => feed.stop().await,
            #[cfg(feature = "http")]
            Transport::Pull(feed) => feed.stop().await,
            Transport::Manual(feed) => feed.stop(),
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        match self {
            #[cfg(feature = "mqtt")]
            Transport::Push(feed) => feed.ready_state(),
            #[cfg(feature = "http")]
            Transport::Pull(feed) => feed.ready_state(),
            Transport::Manual(feed) => feed.ready_state(),
        }
    }
}

impl CommandSink for Transport {
    fn publish(&self, command: &DeviceCommand) -> Result<(), DispatchError> {
        match self {
            #[cfg(feature = "mqtt")]
            Transport::Push(feed) => feed.publish(command),
            #[cfg(feature = "http")]
            Transport::Pull(feed) => feed.publish(command),
            Transport::Manual(feed) => feed.publish(command),
        }
    }
}
