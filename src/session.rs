//! High-level session — `TelemetrySession`, the one entry point a dashboard
//! holds for its lifetime.
//!
//! A session owns the configured transport and one background task. The task
//! is the only writer of telemetry state: it consumes transport events in
//! order, merges samples, appends history, and publishes a fresh
//! [`TelemetrySnapshot`] on a `watch` channel. Every read accessor works on
//! the latest snapshot, so readers never block the writer.

use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{SeedValues, TelemetryConfig, TransportMode};
use crate::domain::device::{Action, CommandDispatcher, Device};
use crate::domain::reading::{CurrentValues, HistoryBuffer, MergedPoint, StreamMerger, TelemetryState};
use crate::domain::status::{self, Alert, InstarStage, StatusReport, Thresholds};
use crate::error::{DispatchError, TelemetryError};
use crate::shared::DeviceId;
use crate::transport::{ReadyState, Transport, TransportEvent, EVENT_CHANNEL_CAPACITY};

/// Read-only view of telemetry state after the most recent event.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub current: CurrentValues,
    pub history: HistoryBuffer,
    /// Set when the feed reported a lost connection, cleared on reconnect.
    pub feed_lost: bool,
    /// Samples merged since the session started.
    pub ingested: u64,
}

impl TelemetrySnapshot {
    fn seeded(state: &TelemetryState) -> Self {
        Self {
            current: state.current(),
            history: state.history().clone(),
            feed_lost: false,
            ingested: 0,
        }
    }
}

/// A running telemetry session.
pub struct TelemetrySession {
    config: TelemetryConfig,
    dispatcher: CommandDispatcher<Transport>,
    snapshot_rx: watch::Receiver<TelemetrySnapshot>,
    task_handle: Option<JoinHandle<()>>,
}

impl TelemetrySession {
    pub fn builder() -> TelemetrySessionBuilder {
        TelemetrySessionBuilder::default()
    }

    /// Validate `config`, build its transport and start ingesting.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        config.validate()?;
        let transport = Transport::from_config(&config)?;
        Self::with_transport(config, transport)
    }

    /// Start with an already constructed transport (e.g. a
    /// [`ManualFeed`](crate::transport::ManualFeed)).
    pub fn with_transport(
        config: TelemetryConfig,
        mut transport: Transport,
    ) -> Result<Self, TelemetryError> {
        config.validate()?;

        let state = TelemetryState::new(
            StreamMerger::new(config.defaults.temperature, config.defaults.humidity),
            HistoryBuffer::new(config.history_capacity),
        );
        let (snapshot_tx, snapshot_rx) = watch::channel(TelemetrySnapshot::seeded(&state));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        transport.start(event_tx)?;
        let task_handle = tokio::spawn(run_session(state, event_rx, snapshot_tx));

        tracing::info!(
            mode = ?config.transport_mode,
            capacity = config.history_capacity,
            "Telemetry session started"
        );

        Ok(Self {
            config,
            dispatcher: CommandDispatcher::new(transport),
            snapshot_rx,
            task_handle: Some(task_handle),
        })
    }

    // ── Read surface ─────────────────────────────────────────────────────

    /// Latest value of every metric (seeded defaults before the first sample).
    pub fn current_values(&self) -> CurrentValues {
        self.snapshot_rx.borrow().current
    }

    /// History, oldest first.
    pub fn history(&self) -> Vec<MergedPoint> {
        self.snapshot_rx.borrow().history.snapshot()
    }

    /// History for chart rendering: one zeroed point while empty.
    pub fn chart_points(&self) -> Vec<MergedPoint> {
        self.snapshot_rx.borrow().history.chart_points()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that is notified after every processed event.
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshot_rx.clone()
    }

    /// Stream of snapshots. Intermediate snapshots may be skipped when the
    /// consumer is slower than the feed; the latest one is always delivered.
    /// Ends once the session task stops.
    pub fn updates(&self) -> Pin<Box<dyn Stream<Item = TelemetrySnapshot> + Send + 'static>> {
        Box::pin(futures_util::stream::unfold(
            self.snapshot_rx.clone(),
            |mut rx| async move {
                rx.changed().await.ok()?;
                let snapshot = rx.borrow_and_update().clone();
                Some((snapshot, rx))
            },
        ))
    }

    // ── Status ───────────────────────────────────────────────────────────

    /// Evaluate any point against the configured thresholds.
    pub fn evaluate(&self, point: &MergedPoint) -> StatusReport {
        status::evaluate(point, &self.config.thresholds)
    }

    /// Status of the current values.
    pub fn status(&self) -> StatusReport {
        self.evaluate(&self.current_values().as_point())
    }

    /// Threshold alerts for the current values, plus a feed alert while the
    /// connection is lost.
    pub fn alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        if self.snapshot_rx.borrow().feed_lost {
            alerts.push(Alert::feed_disconnected());
        }
        alerts.extend(self.status().alerts());
        alerts
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.config.thresholds
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Fire-and-forget actuator command. Returns once the command is handed
    /// to the transport.
    pub fn dispatch(
        &self,
        device_id: impl Into<DeviceId>,
        action: Action,
    ) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(device_id, action)
    }

    /// Actuators configured for the device panel.
    pub fn devices(&self) -> &[Device] {
        &self.config.devices
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    pub fn ready_state(&self) -> ReadyState {
        self.dispatcher.sink().ready_state()
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Stop the transport and the session task. The last snapshot stays
    /// readable afterwards.
    pub async fn shutdown(&mut self) {
        self.dispatcher.sink_mut().stop().await;
        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(Duration::from_secs(1), &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }
        tracing::info!("Telemetry session stopped");
    }
}

impl Drop for TelemetrySession {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Session task ────────────────────────────────────────────────────────────

async fn run_session(
    mut state: TelemetryState,
    mut events: mpsc::Receiver<TransportEvent>,
    snapshot_tx: watch::Sender<TelemetrySnapshot>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Sample(sample) => {
                let point = state.ingest(&sample);
                tracing::trace!(
                    metric = sample.kind().as_str(),
                    value = sample.value(),
                    temperature = point.temperature,
                    humidity = point.humidity,
                    "Merged sample"
                );
                snapshot_tx.send_modify(|snap| {
                    snap.current = state.current();
                    snap.history = state.history().clone();
                    snap.ingested += 1;
                });
            }
            TransportEvent::Connected => {
                tracing::info!("Feed connected");
                snapshot_tx.send_modify(|snap| snap.feed_lost = false);
            }
            TransportEvent::Disconnected { reason } => {
                tracing::warn!(%reason, "Feed disconnected, keeping last values");
                snapshot_tx.send_modify(|snap| snap.feed_lost = true);
            }
            TransportEvent::ReconnectExhausted { attempts } => {
                tracing::error!(attempts, "Feed reconnection exhausted");
                snapshot_tx.send_modify(|snap| snap.feed_lost = true);
            }
        }
    }
    tracing::debug!("Transport event channel closed");
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct TelemetrySessionBuilder {
    config: TelemetryConfig,
    transport: Option<Transport>,
}

impl TelemetrySessionBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport_mode(mut self, mode: TransportMode) -> Self {
        self.config.transport_mode = mode;
        self
    }

    pub fn broker_url(mut self, url: &str) -> Self {
        self.config.feed.broker_url = url.to_string();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Use the rearing preset for a larval stage.
    pub fn instar_stage(mut self, stage: InstarStage) -> Self {
        self.config.thresholds = Thresholds::for_stage(stage);
        self
    }

    pub fn defaults(mut self, defaults: SeedValues) -> Self {
        self.config.defaults = defaults;
        self
    }

    pub fn devices(mut self, devices: Vec<Device>) -> Self {
        self.config.devices = devices;
        self
    }

    /// Use this transport instead of building one from the transport mode.
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<TelemetrySession, TelemetryError> {
        match self.transport {
            Some(transport) => TelemetrySession::with_transport(self.config, transport),
            None => TelemetrySession::start(self.config),
        }
    }
}
