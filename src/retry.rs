//! # Retry Policy
//!
//! Pure backoff computation: attempt number in, next delay out.
//! Exponential growth with a multiplicative jitter in `[1.0, 1.25)` and a
//! hard cap on the resulting delay.

use crate::config::RetryConfig;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Computes retry delays with exponential backoff, jitter and a cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    initial_interval_ms: u64,
    multiplier: f64,
    max_interval_ms: u64,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            initial_interval_ms: config.initial_interval_ms,
            multiplier: config.multiplier,
            max_interval_ms: config.max_interval_ms,
            max_attempts: config.max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt:
    /// `min(max_interval, initial * multiplier^attempt * (1 + U[0, 0.25)))`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.initial_interval_ms as f64 * self.multiplier.powi(attempt as i32);
        let jittered = base * (1.0 + fastrand::f64() * 0.25);
        let capped = jittered.min(self.max_interval_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Absolute due time for the next attempt, from `now`.
    pub fn next_retry_at(&self, attempt: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = self.next_delay(attempt);
        now + ChronoDuration::milliseconds(delay.as_millis() as i64)
    }
}
