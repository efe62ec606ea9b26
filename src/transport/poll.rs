//! Pull feed — periodic HTTP fetch of the most recent samples per metric.
//!
//! Each tick fetches the last `results` entries of every metric feed. The
//! windows of consecutive fetches overlap, so a per-metric watermark keeps
//! already delivered entries from being delivered again.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{CommandSink, ReadyState, TransportEvent};
use crate::config::PollConfig;
use crate::domain::device::DeviceCommand;
use crate::domain::sample::convert::{extract_samples, Extracted};
use crate::domain::sample::Sample;
use crate::error::{DispatchError, FeedError, HttpError};
use crate::http::DataServiceHttp;
use crate::shared::MetricKind;

// ─── Watermark ───────────────────────────────────────────────────────────────

/// Newest entry delivered so far for one metric.
///
/// Without entry ids, several entries may share one `created_at`;
/// `at_instant` counts how many of those have been delivered.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Watermark {
    entry_id: Option<u64>,
    observed_at: DateTime<Utc>,
    at_instant: usize,
}

// ─── Worker ──────────────────────────────────────────────────────────────────

/// Fetch-and-dedup logic, shared between the timer task and direct callers.
pub struct PollWorker {
    config: PollConfig,
    http: DataServiceHttp,
    temperature: Option<Watermark>,
    humidity: Option<Watermark>,
}

impl PollWorker {
    pub fn new(config: PollConfig, http: DataServiceHttp) -> Self {
        Self {
            config,
            http,
            temperature: None,
            humidity: None,
        }
    }

    /// Run one fetch cycle for every metric.
    ///
    /// A failed fetch is logged and that metric is skipped until the next
    /// cycle. Returned samples are new since the previous cycle, oldest
    /// first within each metric.
    pub async fn poll_once(&mut self) -> Vec<Sample> {
        let mut out = Vec::new();
        for kind in MetricKind::ALL {
            let endpoint = self.config.endpoint(kind).clone();
            match self.http.get_feed(&endpoint.url, self.config.results).await {
                Ok(response) => {
                    let extracted = extract_samples(&response, kind, &endpoint.field);
                    out.extend(self.accept(kind, extracted));
                }
                Err(e) => {
                    tracing::warn!(metric = kind.as_str(), url = %endpoint.url, "Poll failed: {}", e);
                }
            }
        }
        out
    }

    /// Keep only entries past the metric's watermark and advance it.
    fn accept(&mut self, kind: MetricKind, extracted: Extracted) -> Vec<Sample> {
        if extracted.rejected > 0 {
            tracing::debug!(
                metric = kind.as_str(),
                rejected = extracted.rejected,
                "Discarded unparseable feed entries"
            );
        }

        let watermark = match kind {
            MetricKind::Temperature => &mut self.temperature,
            MetricKind::Humidity => &mut self.humidity,
        };

        // entries in this window stamped at the watermark's instant, in order
        let mut at_mark = 0usize;
        let mut fresh = Vec::new();
        for item in extracted.samples {
            let observed_at = item.sample.observed_at();
            let is_new = match watermark.as_ref() {
                None => true,
                Some(mark) => match (mark.entry_id, item.entry_id) {
                    (Some(seen), Some(id)) => id > seen,
                    _ if observed_at > mark.observed_at => true,
                    _ if observed_at == mark.observed_at => {
                        at_mark += 1;
                        at_mark > mark.at_instant
                    }
                    _ => false,
                },
            };
            if !is_new {
                continue;
            }
            let at_instant = match watermark.as_ref() {
                Some(mark) if mark.observed_at == observed_at => mark.at_instant + 1,
                _ => 1,
            };
            at_mark = at_instant;
            *watermark = Some(Watermark {
                entry_id: item.entry_id,
                observed_at,
                at_instant,
            });
            fresh.push(item.sample);
        }
        fresh
    }
}

// ─── Public PollFeed ─────────────────────────────────────────────────────────

/// Pull feed over HTTP.
pub struct PollFeed {
    worker: Arc<Mutex<PollWorker>>,
    http: DataServiceHttp,
    command_url: Option<String>,
    interval: Duration,
    task_handle: Option<JoinHandle<()>>,
    ready_state: Arc<AtomicU8>,
}

impl PollFeed {
    pub fn new(config: PollConfig, interval: Duration) -> Result<Self, HttpError> {
        let http = DataServiceHttp::new()?;
        let command_url = config.command_url.clone();
        Ok(Self {
            worker: Arc::new(Mutex::new(PollWorker::new(config, http.clone()))),
            http,
            command_url,
            interval,
            task_handle: None,
            ready_state: Arc::new(AtomicU8::new(ReadyState::Disconnected as u8)),
        })
    }

    /// Start the timer. The first fetch runs immediately.
    pub fn start(&mut self, events: mpsc::Sender<TransportEvent>) -> Result<(), FeedError> {
        if self.task_handle.is_some() {
            return Err(FeedError::AlreadyStarted);
        }

        self.ready_state
            .store(ReadyState::Connected as u8, Ordering::SeqCst);
        let worker = Arc::clone(&self.worker);
        let interval = self.interval;

        tracing::info!(interval_ms = interval.as_millis() as u64, "Starting poll feed");
        self.task_handle = Some(tokio::spawn(async move {
            if events.send(TransportEvent::Connected).await.is_err() {
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let samples = worker.lock().await.poll_once().await;
                tracing::debug!(count = samples.len(), "Poll cycle complete");
                for sample in samples {
                    if events.send(TransportEvent::Sample(sample)).await.is_err() {
                        tracing::debug!("Event receiver dropped, stopping poll feed");
                        return;
                    }
                }
            }
        }));
        Ok(())
    }

    /// Cancel the timer. An in-flight fetch is abandoned.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.ready_state
            .store(ReadyState::Disconnected as u8, Ordering::SeqCst);
    }

    /// Run one fetch cycle outside the timer.
    ///
    /// Fails with [`FeedError::AlreadyStarted`] while the timer runs: the
    /// cycle would advance the shared watermarks and its samples would never
    /// reach the event channel.
    pub async fn poll_once(&self) -> Result<Vec<Sample>, FeedError> {
        if self.task_handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(FeedError::AlreadyStarted);
        }
        Ok(self.worker.lock().await.poll_once().await)
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst))
    }
}

impl CommandSink for PollFeed {
    fn publish(&self, command: &DeviceCommand) -> Result<(), DispatchError> {
        let url = self.command_url.clone().ok_or(DispatchError::Unsupported)?;
        if self.ready_state() != ReadyState::Connected {
            return Err(DispatchError::NotConnected);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DispatchError::PublishFailed(e.to_string()))?;

        let http = self.http.clone();
        let token = command.token();
        runtime.spawn(async move {
            if let Err(e) = http.post_command(&url, &token).await {
                tracing::warn!(command = %token, "Command POST failed: {}", e);
            }
        });
        Ok(())
    }
}

impl Drop for PollFeed {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::Action;
    use crate::domain::sample::wire::FeedResponse;
    use std::collections::{HashMap, VecDeque};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn worker() -> PollWorker {
        PollWorker::new(PollConfig::default(), DataServiceHttp::new().unwrap())
    }

    fn extracted(json: &str, kind: MetricKind) -> Extracted {
        let response: FeedResponse = serde_json::from_str(json).unwrap();
        extract_samples(&response, kind, "value")
    }

    fn values(samples: &[Sample]) -> Vec<f64> {
        samples.iter().map(|s| s.value()).collect()
    }

    #[test]
    fn test_first_cycle_backfills_whole_window() {
        let mut w = worker();
        let batch = extracted(
            r#"{"feeds": [
                {"created_at": "2024-05-01T10:00:00Z", "entry_id": 1, "value": "25"},
                {"created_at": "2024-05-01T10:00:15Z", "entry_id": 2, "value": "26"},
                {"created_at": "2024-05-01T10:00:30Z", "entry_id": 3, "value": "27"}
            ]}"#,
            MetricKind::Temperature,
        );
        assert_eq!(values(&w.accept(MetricKind::Temperature, batch)), vec![25.0, 26.0, 27.0]);
    }

    #[test]
    fn test_overlapping_window_delivers_only_new_entries() {
        let mut w = worker();
        let first = extracted(
            r#"{"feeds": [
                {"created_at": "2024-05-01T10:00:00Z", "entry_id": 1, "value": "80"},
                {"created_at": "2024-05-01T10:00:15Z", "entry_id": 2, "value": "81"}
            ]}"#,
            MetricKind::Humidity,
        );
        let second = extracted(
            r#"{"feeds": [
                {"created_at": "2024-05-01T10:00:15Z", "entry_id": 2, "value": "81"},
                {"created_at": "2024-05-01T10:00:30Z", "entry_id": 3, "value": "82"}
            ]}"#,
            MetricKind::Humidity,
        );
        w.accept(MetricKind::Humidity, first);
        assert_eq!(values(&w.accept(MetricKind::Humidity, second)), vec![82.0]);
    }

    #[test]
    fn test_timestamp_watermark_without_entry_ids() {
        let mut w = worker();
        let batch = r#"{"feeds": [
            {"created_at": "2024-05-01T10:00:00Z", "value": "25"},
            {"created_at": "2024-05-01T10:00:15Z", "value": "26"}
        ]}"#;
        w.accept(MetricKind::Temperature, extracted(batch, MetricKind::Temperature));
        assert!(w
            .accept(MetricKind::Temperature, extracted(batch, MetricKind::Temperature))
            .is_empty());
    }

    #[test]
    fn test_same_instant_entries_without_ids_all_delivered() {
        let mut w = worker();
        let first = r#"{"feeds": [
            {"created_at": "2024-05-01T10:00:00Z", "value": "25"},
            {"created_at": "2024-05-01T10:00:00Z", "value": "26"}
        ]}"#;
        assert_eq!(
            values(&w.accept(MetricKind::Temperature, extracted(first, MetricKind::Temperature))),
            vec![25.0, 26.0]
        );
        assert!(w
            .accept(MetricKind::Temperature, extracted(first, MetricKind::Temperature))
            .is_empty());

        // a third entry lands on the same instant, then a later one
        let second = r#"{"feeds": [
            {"created_at": "2024-05-01T10:00:00Z", "value": "25"},
            {"created_at": "2024-05-01T10:00:00Z", "value": "26"},
            {"created_at": "2024-05-01T10:00:00Z", "value": "27"},
            {"created_at": "2024-05-01T10:00:15Z", "value": "28"}
        ]}"#;
        assert_eq!(
            values(&w.accept(MetricKind::Temperature, extracted(second, MetricKind::Temperature))),
            vec![27.0, 28.0]
        );
    }

    #[test]
    fn test_watermarks_are_per_metric() {
        let mut w = worker();
        let batch = r#"{"feeds": [{"created_at": "2024-05-01T10:00:00Z", "entry_id": 7, "value": "25"}]}"#;
        w.accept(MetricKind::Temperature, extracted(batch, MetricKind::Temperature));
        let hum = w.accept(MetricKind::Humidity, extracted(batch, MetricKind::Humidity));
        assert_eq!(hum.len(), 1);
        assert_eq!(hum[0].kind(), MetricKind::Humidity);
    }

    #[test]
    fn test_publish_without_command_url_is_unsupported() {
        let feed = PollFeed::new(PollConfig::default(), Duration::from_secs(15)).unwrap();
        let result = feed.publish(&DeviceCommand::new("FAN", Action::On));
        assert!(matches!(result, Err(DispatchError::Unsupported)));
    }

    #[test]
    fn test_publish_before_start_is_not_connected() {
        let config = PollConfig {
            command_url: Some("http://127.0.0.1:9/cmd".into()),
            ..PollConfig::default()
        };
        let feed = PollFeed::new(config, Duration::from_secs(15)).unwrap();
        let result = feed.publish(&DeviceCommand::new("FAN", Action::Off));
        assert!(matches!(result, Err(DispatchError::NotConnected)));
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let config = PollConfig {
            temperature: crate::config::PollEndpoint {
                url: "http://127.0.0.1:9/t.json".into(),
                field: "value".into(),
            },
            humidity: crate::config::PollEndpoint {
                url: "http://127.0.0.1:9/h.json".into(),
                field: "value".into(),
            },
            ..PollConfig::default()
        };
        let mut feed = PollFeed::new(config, Duration::from_secs(60)).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        feed.start(tx.clone()).unwrap();
        assert!(matches!(feed.start(tx), Err(FeedError::AlreadyStarted)));
        assert_eq!(feed.ready_state(), ReadyState::Connected);
        assert_eq!(rx.recv().await, Some(TransportEvent::Connected));
        assert!(matches!(feed.poll_once().await, Err(FeedError::AlreadyStarted)));
        feed.stop().await;
        assert_eq!(feed.ready_state(), ReadyState::Disconnected);
    }

    // ── Served feeds ──

    type Script = HashMap<&'static str, Vec<(u16, &'static str)>>;

    /// Minimal HTTP/1.1 server answering each path from its script in order.
    /// Returns the base URL and every request target it saw.
    async fn serve(script: Script) -> (String, Arc<std::sync::Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let script: HashMap<String, VecDeque<(u16, &'static str)>> = script
            .into_iter()
            .map(|(path, replies)| (path.to_string(), replies.into()))
            .collect();
        let script = Arc::new(std::sync::Mutex::new(script));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let requests = seen.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let script = script.clone();
                let requests = requests.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).into_owned();
                    let target = head.split_whitespace().nth(1).unwrap_or("").to_string();
                    let path = target.split('?').next().unwrap_or("").to_string();
                    requests.lock().unwrap().push(target);

                    let (status, body) = script
                        .lock()
                        .unwrap()
                        .get_mut(&path)
                        .and_then(|replies| replies.pop_front())
                        .unwrap_or((404, ""));
                    let response = format!(
                        "HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (base, seen)
    }

    #[tokio::test]
    async fn test_poll_once_against_served_feeds() {
        let t1 = r#"{"feeds": [
            {"created_at": "2024-05-01T10:00:00Z", "entry_id": 1, "value": "25"},
            {"created_at": "2024-05-01T10:00:15Z", "entry_id": 2, "value": "n/a"}
        ]}"#;
        let t3 = r#"{"feeds": [
            {"created_at": "2024-05-01T10:00:00Z", "entry_id": 1, "value": "25"},
            {"created_at": "2024-05-01T10:00:45Z", "entry_id": 3, "value": "26"}
        ]}"#;
        let h1 = r#"{"channel": {"id": 9}, "feeds": [
            {"created_at": "2024-05-01T10:00:00Z", "entry_id": 1, "field2": "80"}
        ]}"#;
        let h2 = r#"{"feeds": [
            {"created_at": "2024-05-01T10:00:00Z", "entry_id": 1, "field2": "80"},
            {"created_at": "2024-05-01T10:00:30Z", "entry_id": 2, "field2": "82"}
        ]}"#;
        let (base, requests) = serve(HashMap::from([
            ("/t.json", vec![(200, t1), (500, "upstream broke"), (200, t3)]),
            ("/h.json", vec![(200, h1), (200, h2), (200, h2)]),
        ]))
        .await;

        let config = PollConfig {
            results: 3,
            temperature: crate::config::PollEndpoint {
                url: format!("{}/t.json?api_key=abc", base),
                field: "value".into(),
            },
            humidity: crate::config::PollEndpoint {
                url: format!("{}/h.json", base),
                field: "field2".into(),
            },
            command_url: None,
        };
        let mut w = PollWorker::new(config, DataServiceHttp::new().unwrap());

        let first = w.poll_once().await;
        let kinds: Vec<MetricKind> = first.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![MetricKind::Temperature, MetricKind::Humidity]);
        assert_eq!(values(&first), vec![25.0, 80.0]);

        // temperature fails this cycle; humidity still delivers
        let second = w.poll_once().await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].kind(), MetricKind::Humidity);
        assert_eq!(second[0].value(), 82.0);

        // next tick picks temperature up again from the untouched watermark
        let third = w.poll_once().await;
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].kind(), MetricKind::Temperature);
        assert_eq!(third[0].value(), 26.0);

        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 6);
        assert!(requests.iter().all(|r| r.ends_with("results=3")));
        assert!(requests.contains(&"/t.json?api_key=abc&results=3".to_string()));
        assert!(requests.contains(&"/h.json?results=3".to_string()));
    }
}
