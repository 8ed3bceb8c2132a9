use std::time::Duration;

use tracing::debug;

use super::config::RetryConfig;
use crate::types::NotificationResult;

/// Decides when to retry and how long to wait. Attempt numbers are 1-based.
pub trait RetryPolicy: Send + Sync {
    /// Whether another attempt should follow `result`, which came from
    /// attempt number `attempt`.
    fn should_retry(&self, result: &NotificationResult, attempt: u32) -> bool;

    /// Delay to wait before running attempt number `attempt`.
    fn delay_before_attempt(&self, attempt: u32) -> Duration;

    fn max_attempts(&self) -> u32;
}

/// Exponential backoff without jitter.
///
/// The delay before attempt `n` is `initial_delay * multiplier^(n-2)`,
/// capped at `max_delay`; there is no delay before the first attempt.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffRetry {
    config: RetryConfig,
}

impl ExponentialBackoffRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl RetryPolicy for ExponentialBackoffRetry {
    fn should_retry(&self, result: &NotificationResult, attempt: u32) -> bool {
        if !self.config.retry_on_failure {
            return false;
        }
        if attempt >= self.config.max_attempts {
            debug!(
                max_attempts = self.config.max_attempts,
                "Max attempts reached, no more retries"
            );
            return false;
        }
        !result.is_success()
    }

    fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let delay_ms =
            self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        let max_ms = self.config.max_delay_ms;

        // NaN and infinity both collapse to the cap
        if delay_ms.is_nan() || delay_ms >= max_ms as f64 {
            return Duration::from_millis(max_ms);
        }
        Duration::from_millis(delay_ms as u64)
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}
