//! Sample domain — single-metric observations and payload validation.

pub mod convert;
pub mod wire;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SampleError;
use crate::shared::MetricKind;

/// One observed value for one metric at one time.
///
/// The value is always finite: constructors reject anything else, so a
/// `Sample` existing at all means the adapter boundary accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    kind: MetricKind,
    value: f64,
    observed_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(kind: MetricKind, value: f64, observed_at: DateTime<Utc>) -> Result<Self, SampleError> {
        if !value.is_finite() {
            return Err(SampleError::NonFinite(value));
        }
        Ok(Self {
            kind,
            value,
            observed_at,
        })
    }

    /// Decode a push-feed payload (UTF-8 numeric string) observed now.
    pub fn from_payload(kind: MetricKind, payload: &[u8]) -> Result<Self, SampleError> {
        Self::from_payload_at(kind, payload, Utc::now())
    }

    pub fn from_payload_at(
        kind: MetricKind,
        payload: &[u8],
        observed_at: DateTime<Utc>,
    ) -> Result<Self, SampleError> {
        let text = std::str::from_utf8(payload).map_err(|_| SampleError::NotUtf8)?;
        let value = parse_value(text)?;
        Self::new(kind, value, observed_at)
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Parse a numeric string into a finite `f64`.
pub fn parse_value(raw: &str) -> Result<f64, SampleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SampleError::Missing);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| SampleError::NotNumeric(trimmed.to_string()))?;
    if !value.is_finite() {
        return Err(SampleError::NonFinite(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_payload_accepts_padded_number() {
        let s = Sample::from_payload(MetricKind::Temperature, b" 26.5\n").unwrap();
        assert_eq!(s.kind(), MetricKind::Temperature);
        assert_eq!(s.value(), 26.5);
    }

    #[test]
    fn test_from_payload_rejects_text() {
        let err = Sample::from_payload(MetricKind::Humidity, b"warm").unwrap_err();
        assert_eq!(err, SampleError::NotNumeric("warm".into()));
    }

    #[test]
    fn test_from_payload_rejects_nan_and_inf() {
        assert!(matches!(
            Sample::from_payload(MetricKind::Humidity, b"NaN"),
            Err(SampleError::NonFinite(_))
        ));
        assert!(matches!(
            Sample::from_payload(MetricKind::Humidity, b"inf"),
            Err(SampleError::NonFinite(_))
        ));
    }

    #[test]
    fn test_from_payload_rejects_empty_and_invalid_utf8() {
        assert_eq!(
            Sample::from_payload(MetricKind::Humidity, b"   ").unwrap_err(),
            SampleError::Missing
        );
        assert_eq!(
            Sample::from_payload(MetricKind::Humidity, &[0xff, 0xfe]).unwrap_err(),
            SampleError::NotUtf8
        );
    }
}
