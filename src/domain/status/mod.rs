//! Status domain — threshold classification of the current environment.
//!
//! Everything here is pure: evaluation only compares numbers and can be called
//! on every render.

use serde::{Deserialize, Serialize};

use crate::domain::reading::MergedPoint;
use crate::error::ConfigError;
use crate::shared::MetricKind;

// ─── Ranges & thresholds ─────────────────────────────────────────────────────

/// Inclusive `[min, max]` band. Serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn classify(&self, value: f64) -> Deviation {
        if value < self.min {
            Deviation::Below
        } else if value > self.max {
            Deviation::Above
        } else {
            Deviation::Within
        }
    }

    fn validate(&self, metric: MetricKind) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ConfigError::InvalidRange {
                metric,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl From<[f64; 2]> for Range {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Range> for [f64; 2] {
    fn from(r: Range) -> Self {
        [r.min, r.max]
    }
}

/// Per-metric acceptable ranges. A metric missing from a config document
/// keeps its default range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub temperature: Range,
    pub humidity: Range,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature: Range::new(24.0, 28.0),
            humidity: Range::new(70.0, 90.0),
        }
    }
}

impl Thresholds {
    /// Recommended rearing conditions for a larval stage.
    pub fn for_stage(stage: InstarStage) -> Self {
        let (temperature, humidity) = match stage {
            InstarStage::Early => (Range::new(26.0, 28.0), Range::new(85.0, 90.0)),
            InstarStage::Third => (Range::new(25.0, 27.0), Range::new(80.0, 85.0)),
            InstarStage::Fourth => (Range::new(24.0, 26.0), Range::new(75.0, 80.0)),
            InstarStage::Fifth => (Range::new(23.0, 25.0), Range::new(70.0, 75.0)),
        };
        Self {
            temperature,
            humidity,
        }
    }

    pub fn range(&self, kind: MetricKind) -> Range {
        match kind {
            MetricKind::Temperature => self.temperature,
            MetricKind::Humidity => self.humidity,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.temperature.validate(MetricKind::Temperature)?;
        self.humidity.validate(MetricKind::Humidity)
    }
}

/// Silkworm larval stages with distinct climate requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstarStage {
    /// 1st & 2nd instar (chawki rearing).
    Early,
    Third,
    Fourth,
    Fifth,
}

impl InstarStage {
    pub const ALL: [InstarStage; 4] = [
        InstarStage::Early,
        InstarStage::Third,
        InstarStage::Fourth,
        InstarStage::Fifth,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InstarStage::Early => "1st & 2nd Instar",
            InstarStage::Third => "3rd Instar",
            InstarStage::Fourth => "4th Instar",
            InstarStage::Fifth => "5th Instar",
        }
    }
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// Where a value sits relative to its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deviation {
    Below,
    Within,
    Above,
}

/// Classification of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStatus {
    pub metric: MetricKind,
    pub value: f64,
    pub range: Range,
    pub deviation: Deviation,
}

impl MetricStatus {
    pub fn ok(&self) -> bool {
        self.deviation == Deviation::Within
    }

    /// Card label: `Optimal` / `Check`.
    pub fn card_label(&self) -> &'static str {
        if self.ok() {
            "Optimal"
        } else {
            "Check"
        }
    }

    /// Status-panel label: `OK` / `Alert`.
    pub fn panel_label(&self) -> &'static str {
        if self.ok() {
            "OK"
        } else {
            "Alert"
        }
    }
}

/// Per-metric and aggregate status for one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusReport {
    pub temperature: MetricStatus,
    pub humidity: MetricStatus,
}

impl StatusReport {
    pub fn temperature_ok(&self) -> bool {
        self.temperature.ok()
    }

    pub fn humidity_ok(&self) -> bool {
        self.humidity.ok()
    }

    /// True only when every metric is within range.
    pub fn is_optimal(&self) -> bool {
        self.temperature_ok() && self.humidity_ok()
    }

    pub fn get(&self, kind: MetricKind) -> &MetricStatus {
        match kind {
            MetricKind::Temperature => &self.temperature,
            MetricKind::Humidity => &self.humidity,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricStatus> {
        [&self.temperature, &self.humidity].into_iter()
    }

    /// Alert list for the alerts panel, one entry per metric.
    pub fn alerts(&self) -> Vec<Alert> {
        self.iter()
            .map(|s| {
                let (severity, text) = match s.deviation {
                    Deviation::Within => (Severity::Ok, "stable"),
                    Deviation::Below => (Severity::Warning, "below range"),
                    Deviation::Above => (Severity::Warning, "exceeds range"),
                };
                Alert {
                    severity,
                    metric: Some(s.metric),
                    message: format!("{} {}", s.metric, text),
                }
            })
            .collect()
    }
}

/// Classify `point` against `thresholds`. Both bounds are inclusive.
pub fn evaluate(point: &MergedPoint, thresholds: &Thresholds) -> StatusReport {
    let status = |metric: MetricKind| {
        let range = thresholds.range(metric);
        let value = point.value(metric);
        MetricStatus {
            metric,
            value,
            range,
            deviation: range.classify(value),
        }
    };
    StatusReport {
        temperature: status(MetricKind::Temperature),
        humidity: status(MetricKind::Humidity),
    }
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

/// One line of the alerts panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: Severity,
    /// `None` for alerts not tied to a metric (e.g. feed disconnected).
    pub metric: Option<MetricKind>,
    pub message: String,
}

impl Alert {
    pub fn feed_disconnected() -> Self {
        Self {
            severity: Severity::Error,
            metric: None,
            message: "Sensor feed disconnected".to_string(),
        }
    }
}
