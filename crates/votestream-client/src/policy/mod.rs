//! Reconnect policies.
//!
//! The engine asks the policy for a delay after every lost connection:
//! ```text
//! Lost(err) → [is_retryable?] → ReconnectPolicy::next_delay(attempt) → sleep → reconnect
//!                                         └── None → stay Disconnected
//! ```

pub mod backoff;

pub use backoff::{BackoffConfig, ExponentialBackoff};

use std::time::Duration;

/// Decides whether, and when, to reconnect after the `attempt`-th consecutive loss.
pub trait ReconnectPolicy: Send + Sync + std::fmt::Debug {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` to give up.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Never reconnect; the caller re-invokes `connect` when it wants to.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}
