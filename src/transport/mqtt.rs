//! Push feed — MQTT over TCP or WebSocket via `rumqttc`.
//!
//! - Background tokio task drives the `rumqttc` event loop
//! - Subscribes to one topic per metric on every ConnAck
//! - Exponential backoff reconnection with jitter (opt-out via config)
//! - Silent until the first ConnAck: no events before the connection is up
//! - Fire-and-forget command publishing (QoS 0, no retain)

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{CommandSink, ReadyState, TransportEvent};
use crate::config::FeedConfig;
use crate::domain::device::DeviceCommand;
use crate::domain::sample::Sample;
use crate::error::{DispatchError, FeedError};
use crate::shared::MetricKind;

/// Requests buffered between [`AsyncClient`] and the event loop.
const REQUEST_CAPACITY: usize = 32;

// ─── Broker address ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Tcp,
    Tls,
    Ws,
    Wss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BrokerAddr {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Full URL, used as the broker address for WebSocket transports.
    url: String,
}

fn parse_broker_url(url: &str) -> Result<BrokerAddr, FeedError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| FeedError::InvalidUrl(url.to_string()))?;
    let (scheme, default_port) = match scheme.to_ascii_lowercase().as_str() {
        "mqtt" | "tcp" => (Scheme::Tcp, 1883),
        "mqtts" | "ssl" => (Scheme::Tls, 8883),
        "ws" => (Scheme::Ws, 80),
        "wss" => (Scheme::Wss, 443),
        _ => return Err(FeedError::InvalidUrl(url.to_string())),
    };

    let authority = rest.split('/').next().unwrap_or_default();
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| FeedError::InvalidUrl(url.to_string()))?;
            (host, port)
        }
        None => (authority, default_port),
    };
    if host.is_empty() {
        return Err(FeedError::InvalidUrl(url.to_string()));
    }

    Ok(BrokerAddr {
        scheme,
        host: host.to_string(),
        port,
        url: url.to_string(),
    })
}

fn client_id(config: &FeedConfig) -> String {
    if config.client_id.is_empty() {
        format!("silkworm-{:08x}", rand::random::<u32>())
    } else {
        config.client_id.clone()
    }
}

fn mqtt_options(config: &FeedConfig) -> Result<MqttOptions, FeedError> {
    let addr = parse_broker_url(&config.broker_url)?;
    let id = client_id(config);
    let mut options = match addr.scheme {
        Scheme::Tcp | Scheme::Tls => MqttOptions::new(id, addr.host, addr.port),
        Scheme::Ws | Scheme::Wss => MqttOptions::new(id, addr.url, addr.port),
    };
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    options.set_clean_session(true);
    match addr.scheme {
        Scheme::Tcp => {}
        Scheme::Tls => {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }
        Scheme::Ws => {
            options.set_transport(rumqttc::Transport::Ws);
        }
        Scheme::Wss => {
            options.set_transport(rumqttc::Transport::wss_with_default_config());
        }
    }
    Ok(options)
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: FeedConfig,
    client: AsyncClient,
    events: mpsc::Sender<TransportEvent>,
    reconnect_attempts: u32,
    ever_connected: bool,
    ready_state: Arc<AtomicU8>,
}

impl TaskState {
    fn set_state(&self, state: ReadyState) {
        self.ready_state.store(state as u8, Ordering::SeqCst);
    }

    fn connected(&self) -> bool {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst)) == ReadyState::Connected
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect && self.reconnect_attempts < self.config.max_reconnect_attempts
    }
}

// ─── Public MqttFeed ─────────────────────────────────────────────────────────

/// Push feed over MQTT.
///
/// The event loop runs in a background task; [`MqttFeed`] only keeps the
/// client handle used for publishing and shutdown.
pub struct MqttFeed {
    config: FeedConfig,
    client: Option<AsyncClient>,
    task_handle: Option<JoinHandle<()>>,
    ready_state: Arc<AtomicU8>,
}

impl MqttFeed {
    /// Create the feed. Does not connect yet.
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            client: None,
            task_handle: None,
            ready_state: Arc::new(AtomicU8::new(ReadyState::Disconnected as u8)),
        }
    }

    /// Spawn the connection task. Returns immediately; `Connected` is emitted
    /// once the broker acknowledges the session.
    pub fn start(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), FeedError> {
        if self.task_handle.is_some() {
            return Err(FeedError::AlreadyStarted);
        }

        let options = mqtt_options(&self.config)?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        self.ready_state
            .store(ReadyState::Connecting as u8, Ordering::SeqCst);

        let state = TaskState {
            config: self.config.clone(),
            client: client.clone(),
            events,
            reconnect_attempts: 0,
            ever_connected: false,
            ready_state: Arc::clone(&self.ready_state),
        };

        tracing::info!(broker = %self.config.broker_url, "Connecting to MQTT broker");
        self.task_handle = Some(tokio::spawn(run_task(state, eventloop)));
        self.client = Some(client);
        Ok(())
    }

    /// Disconnect gracefully and wait for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.try_disconnect();
        }

        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(Duration::from_secs(5), &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }

        self.ready_state
            .store(ReadyState::Disconnected as u8, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Connected
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst))
    }
}

impl CommandSink for MqttFeed {
    fn publish(&self, command: &DeviceCommand) -> Result<(), DispatchError> {
        let client = match &self.client {
            Some(client) if self.is_connected() => client,
            _ => return Err(DispatchError::NotConnected),
        };
        client
            .try_publish(
                self.config.command_topic.as_str(),
                QoS::AtMostOnce,
                false,
                command.token().into_bytes(),
            )
            .map_err(|e| DispatchError::PublishFailed(e.to_string()))
    }
}

impl Drop for MqttFeed {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState, mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                state.reconnect_attempts = 0;
                state.ever_connected = true;
                state.set_state(ReadyState::Connected);
                tracing::info!("MQTT connected");
                subscribe_all(&state);
                let _ = state.events.send(TransportEvent::Connected).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if !state.connected() {
                    continue;
                }
                if let Some(sample) = decode_publish(&state.config, &publish.topic, &publish.payload)
                {
                    if state.events.send(TransportEvent::Sample(sample)).await.is_err() {
                        tracing::debug!("Event receiver dropped, stopping MQTT task");
                        return;
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                state.set_state(ReadyState::Disconnected);
                tracing::info!("MQTT disconnect requested");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                let was_connected = state.connected();
                state.set_state(ReadyState::Disconnected);
                if was_connected {
                    tracing::warn!("MQTT connection lost: {}", e);
                    let _ = state
                        .events
                        .send(TransportEvent::Disconnected {
                            reason: e.to_string(),
                        })
                        .await;
                } else {
                    tracing::debug!("MQTT connection attempt failed: {}", e);
                }

                if !state.should_reconnect() {
                    if state.ever_connected || state.reconnect_attempts > 0 {
                        tracing::error!(
                            attempts = state.reconnect_attempts,
                            "MQTT reconnection gave up"
                        );
                        let _ = state
                            .events
                            .send(TransportEvent::ReconnectExhausted {
                                attempts: state.reconnect_attempts,
                            })
                            .await;
                    }
                    return;
                }

                state.set_state(ReadyState::Connecting);
                backoff_sleep(&mut state).await;
            }
        }
    }
}

/// Decode one inbound message into at most one sample.
fn decode_publish(config: &FeedConfig, topic: &str, payload: &[u8]) -> Option<Sample> {
    let Some(kind) = config.metric_for_topic(topic) else {
        tracing::debug!(topic, "Ignoring message on unmapped topic");
        return None;
    };
    match Sample::from_payload(kind, payload) {
        Ok(sample) => Some(sample),
        Err(e) => {
            tracing::warn!(topic, metric = kind.as_str(), "Dropping malformed payload: {}", e);
            None
        }
    }
}

fn subscribe_all(state: &TaskState) {
    for kind in MetricKind::ALL {
        let topic = state.config.topic(kind);
        if let Err(e) = state.client.try_subscribe(topic, QoS::AtMostOnce) {
            tracing::error!(topic, "Subscribe failed: {}", FeedError::SubscribeFailed(e.to_string()));
        }
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

fn backoff_delay_ms(base_ms: u32, attempt: u32) -> u32 {
    let exp = attempt.saturating_sub(1).min(10);
    let base = base_ms.saturating_mul(1u32 << exp);
    let jitter = rand::random::<u32>() % 500;
    base.saturating_add(jitter).min(60_000)
}

async fn backoff_sleep(state: &mut TaskState) {
    state.reconnect_attempts += 1;
    let delay = backoff_delay_ms(state.config.base_reconnect_delay_ms, state.reconnect_attempts);

    tracing::info!(
        "Reconnect attempt {}/{} in {}ms",
        state.reconnect_attempts,
        state.config.max_reconnect_attempts,
        delay
    );

    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
