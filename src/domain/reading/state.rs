//! Reading state containers — carry-forward merger plus history.
//!
//! Both are plain synchronous structs. The session owns one of each inside a
//! single task; nothing here needs locking.

use chrono::{DateTime, Utc};

use super::{CurrentValues, HistoryBuffer, MergedPoint};
use crate::domain::sample::Sample;
use crate::shared::MetricKind;

/// Turns an arbitrary-order stream of single-metric samples into complete
/// points by carrying forward the last known value of every other metric.
#[derive(Debug, Clone)]
pub struct StreamMerger {
    last_temperature: f64,
    last_humidity: f64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl StreamMerger {
    /// Seed the last-known values used before a metric's first observation.
    pub fn new(default_temperature: f64, default_humidity: f64) -> Self {
        Self {
            last_temperature: default_temperature,
            last_humidity: default_humidity,
            last_timestamp: None,
        }
    }

    /// Merge one sample, stamped with the arrival time `now`.
    ///
    /// The point timestamp never goes backwards: if the wall clock steps back,
    /// the previous timestamp is reused.
    pub fn merge(&mut self, sample: &Sample, now: DateTime<Utc>) -> MergedPoint {
        match sample.kind() {
            MetricKind::Temperature => self.last_temperature = sample.value(),
            MetricKind::Humidity => self.last_humidity = sample.value(),
        }

        let timestamp = match self.last_timestamp {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);

        MergedPoint {
            timestamp,
            temperature: self.last_temperature,
            humidity: self.last_humidity,
        }
    }

    pub fn current(&self) -> CurrentValues {
        CurrentValues {
            temperature: self.last_temperature,
            humidity: self.last_humidity,
            updated_at: self.last_timestamp,
        }
    }
}

/// Merger and history bundled as the one writer of telemetry state.
#[derive(Debug, Clone)]
pub struct TelemetryState {
    merger: StreamMerger,
    history: HistoryBuffer,
}

impl TelemetryState {
    pub fn new(merger: StreamMerger, history: HistoryBuffer) -> Self {
        Self { merger, history }
    }

    /// Merge a sample arriving now and record the resulting point.
    pub fn ingest(&mut self, sample: &Sample) -> MergedPoint {
        self.ingest_at(sample, Utc::now())
    }

    pub fn ingest_at(&mut self, sample: &Sample, now: DateTime<Utc>) -> MergedPoint {
        let point = self.merger.merge(sample, now);
        self.history.append(point);
        point
    }

    pub fn current(&self) -> CurrentValues {
        self.merger.current()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Latest merged point, falling back to the seeded values.
    pub fn latest_point(&self) -> MergedPoint {
        self.history
            .latest()
            .copied()
            .unwrap_or_else(|| self.merger.current().as_point())
    }
}
