//! Connection lifecycle state machine.
//!
//! State transitions:
//! - any → `Connecting`:              request issued
//! - `Connecting` → `Connected`:      response readable, or `connected` frame
//! - any → `Disconnected`:            read error, end of stream, bad status, close

use crate::types::{ConnectionState, ConnectionStatus};

#[derive(Debug, Clone, Default)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
    last_error: Option<String>,
}

impl ConnectionLifecycle {
    /// Starts `Disconnected`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            last_error: self.last_error.clone(),
        }
    }

    /// A new request is on its way. Clears the previous error.
    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
        self.last_error = None;
        tracing::debug!("lifecycle → connecting");
    }

    /// The stream is live. Returns `true` if the state changed.
    ///
    /// Ignored while `Disconnected`: a frame that races with teardown must
    /// not resurrect a closed connection.
    pub fn mark_connected(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Connected;
                tracing::debug!("lifecycle → connected");
                true
            }
            ConnectionState::Connected => false,
            ConnectionState::Disconnected => {
                tracing::warn!("ignoring connected signal while disconnected");
                false
            }
        }
    }

    /// The connection is gone. `error` is `None` for a caller-requested close.
    pub fn disconnect(&mut self, error: Option<String>) {
        if let Some(reason) = &error {
            tracing::warn!(error = %reason, "lifecycle → disconnected");
        } else {
            tracing::debug!("lifecycle → disconnected");
        }
        self.state = ConnectionState::Disconnected;
        self.last_error = error;
    }
}
