//! Retry policy with exponential backoff and optional jitter

use std::time::Duration;

// == Retry Policy ==
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Whether transient failures are retried at all
    pub enabled: bool,
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry
    pub base_delay: Duration,
    /// Spread applied to each delay, 0.0 (none) to 1.0 (+/- 50%)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Single attempt, failures surface immediately.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    // == Delay For ==
    /// Delay before retry number `retry` (0-based): `base_delay * 2^retry`.
    ///
    /// With a zero jitter factor the result is exact, which keeps backoff
    /// timing reproducible.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);

        if self.jitter_factor <= 0.0 {
            return delay;
        }

        let spread = self.jitter_factor * (fastrand::f64() - 0.5);
        let scaled = delay.as_secs_f64() * (1.0 + spread).max(0.0);
        Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX)
    }
}
