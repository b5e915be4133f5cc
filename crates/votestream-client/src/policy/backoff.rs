//! Exponential backoff between reconnect attempts.

use std::time::Duration;

use super::ReconnectPolicy;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum consecutive attempts; 0 = unlimited.
    pub max_retries: u32,
    /// Delay before the first attempt.
    pub initial_backoff: Duration,
    /// Cap on the delay.
    pub max_backoff: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Stateless: the delay depends only on the attempt number.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub config: BackoffConfig,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || (self.config.max_retries > 0 && attempt > self.config.max_retries) {
            return None;
        }
        // exponent capped so powi can't overflow to inf on long outages
        let exponent = (attempt - 1).min(64) as i32;
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi(exponent);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }
}
