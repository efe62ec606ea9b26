//! In-process transport — samples and connection changes are injected through
//! a [`ManualHandle`]. Used for replaying recorded data and in tests.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{CommandSink, ReadyState, TransportEvent};
use crate::domain::device::DeviceCommand;
use crate::domain::sample::Sample;
use crate::error::{DispatchError, FeedError};
use crate::shared::MetricKind;

#[derive(Default)]
struct Shared {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    published: Mutex<Vec<DeviceCommand>>,
    ready_state: AtomicU8,
}

impl Shared {
    fn sender(&self) -> Option<mpsc::Sender<TransportEvent>> {
        self.events.lock().ok().and_then(|guard| guard.clone())
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ReadyState) {
        self.ready_state.store(state as u8, Ordering::SeqCst);
    }
}

/// Transport half, owned by the session.
pub struct ManualFeed {
    shared: Arc<Shared>,
}

/// Injection half, kept by the caller.
#[derive(Clone)]
pub struct ManualHandle {
    shared: Arc<Shared>,
}

impl ManualFeed {
    pub fn new() -> (ManualFeed, ManualHandle) {
        let shared = Arc::new(Shared::default());
        (
            ManualFeed {
                shared: Arc::clone(&shared),
            },
            ManualHandle { shared },
        )
    }

    /// Attach the event channel and report `Connected`.
    pub fn start(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), FeedError> {
        let mut guard = self
            .shared
            .events
            .lock()
            .map_err(|_| FeedError::ConnectionFailed("state lock poisoned".into()))?;
        if guard.is_some() {
            return Err(FeedError::AlreadyStarted);
        }
        let _ = events.try_send(TransportEvent::Connected);
        *guard = Some(events);
        self.shared.set_state(ReadyState::Connected);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Ok(mut guard) = self.shared.events.lock() {
            guard.take();
        }
        self.shared.set_state(ReadyState::Disconnected);
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.ready_state()
    }
}

impl CommandSink for ManualFeed {
    fn publish(&self, command: &DeviceCommand) -> Result<(), DispatchError> {
        if self.shared.ready_state() != ReadyState::Connected {
            return Err(DispatchError::NotConnected);
        }
        self.shared
            .published
            .lock()
            .map_err(|_| DispatchError::PublishFailed("state lock poisoned".into()))?
            .push(command.clone());
        Ok(())
    }
}

impl ManualHandle {
    /// Deliver a raw payload the way a push feed would: malformed payloads
    /// are logged and dropped. Returns whether a sample was delivered.
    pub async fn send_payload(&self, kind: MetricKind, payload: &[u8]) -> bool {
        match Sample::from_payload(kind, payload) {
            Ok(sample) => self.send_sample(sample).await,
            Err(e) => {
                tracing::warn!(metric = kind.as_str(), "Dropping malformed payload: {}", e);
                false
            }
        }
    }

    /// Deliver an already validated sample. Nothing is delivered while the
    /// feed is not connected.
    pub async fn send_sample(&self, sample: Sample) -> bool {
        if self.shared.ready_state() != ReadyState::Connected {
            return false;
        }
        match self.shared.sender() {
            Some(tx) => tx.send(TransportEvent::Sample(sample)).await.is_ok(),
            None => false,
        }
    }

    /// Simulate a dropped connection.
    pub async fn drop_connection(&self, reason: &str) {
        self.shared.set_state(ReadyState::Disconnected);
        if let Some(tx) = self.shared.sender() {
            let _ = tx
                .send(TransportEvent::Disconnected {
                    reason: reason.to_string(),
                })
                .await;
        }
    }

    /// Simulate the connection coming back.
    pub async fn restore_connection(&self) {
        if let Some(tx) = self.shared.sender() {
            self.shared.set_state(ReadyState::Connected);
            let _ = tx.send(TransportEvent::Connected).await;
        }
    }

    /// Commands published through the feed so far.
    pub fn published(&self) -> Vec<DeviceCommand> {
        self.shared
            .published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.ready_state()
    }
}
