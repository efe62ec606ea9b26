//! Retry policies for HTTP requests.

use std::time::Duration;

/// Retry policy for an HTTP request.
#[derive(Debug, Clone, Default)]
pub enum RetryPolicy {
    /// No retries. Used for command POSTs, which are fire-and-forget.
    #[default]
    None,
    /// Retry on transport failures + 502/503/504, with backoff on 429.
    /// Used for feed fetches.
    Idempotent,
    /// User-provided retry logic.
    Custom(RetryConfig),
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
    /// Whether to add jitter to the delay.
    pub jitter: bool,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::idempotent()
    }
}

impl RetryConfig {
    /// Default for feed fetches.
    ///
    /// Kept short: the worst case (~3.5s of backoff) must stay well inside a
    /// poll interval, since a failed cycle is simply retried on the next tick.
    pub fn idempotent() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            backoff_factor: 2.0,
            jitter: true,
            retryable_statuses: vec![429, 502, 503, 504],
        }
    }

    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            let jitter_range = capped * 0.25;
            let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(final_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64, factor: f64) -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_factor: factor,
            jitter: false,
            retryable_statuses: vec![],
        }
    }

    #[test]
    fn test_command_posts_do_not_retry_by_default() {
        assert!(matches!(RetryPolicy::default(), RetryPolicy::None));
    }

    #[test]
    fn test_feed_retry_statuses() {
        let config = RetryConfig::idempotent();
        for status in [429, 502, 503, 504] {
            assert!(config.retryable_statuses.contains(&status));
        }
        assert!(!config.retryable_statuses.contains(&500));
    }

    #[test]
    fn test_delay_doubles() {
        let config = no_jitter(100, 10_000, 2.0);
        let delays: Vec<u128> = (0..3).map(|a| config.delay_for_attempt(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400]);
    }

    #[test]
    fn test_delay_caps_at_max() {
        let config = no_jitter(1000, 2000, 10.0);
        assert_eq!(config.delay_for_attempt(3).as_millis(), 2000);
    }

    #[test]
    fn test_feed_backoff_fits_inside_default_poll_interval() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::idempotent()
        };
        let total: Duration = (0..config.max_retries).map(|a| config.delay_for_attempt(a)).sum();
        assert!(total < Duration::from_secs(15));
    }
}
