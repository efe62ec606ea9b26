//! Reading domain — merged multi-metric points, carry-forward merging,
//! bounded trend history.

pub mod history;
pub mod state;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::MetricKind;

pub use history::HistoryBuffer;
pub use state::{StreamMerger, TelemetryState};

/// A complete record covering every tracked metric at one timestamp.
///
/// Each field is either freshly observed or carried forward from the last
/// known value of that metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedPoint {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
}

impl MergedPoint {
    /// Zero-valued point rendered by charts while the history is empty.
    pub fn placeholder() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            temperature: 0.0,
            humidity: 0.0,
        }
    }

    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Temperature => self.temperature,
            MetricKind::Humidity => self.humidity,
        }
    }
}

/// Latest known value of every metric, as shown on the single-metric cards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentValues {
    pub temperature: f64,
    pub humidity: f64,
    /// When the last sample (of any metric) was merged. `None` until the
    /// first sample arrives and the values are still the seeded defaults.
    pub updated_at: Option<DateTime<Utc>>,
}

impl CurrentValues {
    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Temperature => self.temperature,
            MetricKind::Humidity => self.humidity,
        }
    }

    /// The values as a point, for status evaluation before any history exists.
    pub fn as_point(&self) -> MergedPoint {
        MergedPoint {
            timestamp: self.updated_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            temperature: self.temperature,
            humidity: self.humidity,
        }
    }
}

impl From<MergedPoint> for CurrentValues {
    fn from(p: MergedPoint) -> Self {
        Self {
            temperature: p.temperature,
            humidity: p.humidity,
            updated_at: Some(p.timestamp),
        }
    }
}
