//! Last-seen tracking for `heartbeat` frames.

use std::time::{Duration, Instant};

/// Records when the server last proved it was alive.
///
/// Nothing here acts on staleness; a caller can poll [`is_stale`] to build
/// an idle-timeout policy.
///
/// [`is_stale`]: HeartbeatMonitor::is_stale
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    last_seen: Instant,
    beats: u64,
}

impl HeartbeatMonitor {
    /// Starts counting from now.
    pub fn new() -> Self {
        Self {
            last_seen: Instant::now(),
            beats: 0,
        }
    }

    pub fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&mut self, at: Instant) {
        self.last_seen = at;
        self.beats += 1;
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn beats(&self) -> u64 {
        self.beats
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    pub fn is_stale(&self, max_idle: Duration) -> bool {
        self.idle_for() > max_idle
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new()
    }
}
