//! Conversions: pull-feed wire entries → validated samples.

use super::wire::{FeedEntry, FeedResponse};
use super::{parse_value, Sample};
use crate::error::SampleError;
use crate::shared::serde_util::parse_rfc3339;
use crate::shared::MetricKind;

impl FeedEntry {
    /// Validate this entry into a [`Sample`] of `kind`, reading `selector`.
    pub fn to_sample(&self, kind: MetricKind, selector: &str) -> Result<Sample, SampleError> {
        let raw = self.field(selector).ok_or(SampleError::Missing)?;
        let value = parse_value(&raw)?;
        let observed_at = parse_rfc3339(&self.created_at)
            .ok_or_else(|| SampleError::InvalidTimestamp(self.created_at.clone()))?;
        Sample::new(kind, value, observed_at)
    }
}

/// A validated sample still tagged with its feed entry id, so the pull
/// transport can tell repeated entries apart across overlapping fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSample {
    pub entry_id: Option<u64>,
    pub sample: Sample,
}

/// Samples extracted from one feed response, plus how many entries were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub samples: Vec<FeedSample>,
    pub rejected: usize,
}

/// Map a feed response into samples, discarding entries that fail validation.
///
/// Output keeps the response's oldest-first order.
pub fn extract_samples(response: &FeedResponse, kind: MetricKind, selector: &str) -> Extracted {
    let mut out = Extracted::default();
    for entry in &response.feeds {
        match entry.to_sample(kind, selector) {
            Ok(sample) => out.samples.push(FeedSample {
                entry_id: entry.entry_id,
                sample,
            }),
            Err(e) => {
                tracing::debug!(
                    metric = kind.as_str(),
                    entry_id = ?entry.entry_id,
                    "Dropping feed entry: {}",
                    e
                );
                out.rejected += 1;
            }
        }
    }
    out
}
