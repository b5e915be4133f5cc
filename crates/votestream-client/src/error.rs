//! Client-side error types.

use thiserror::Error;

/// Errors from the stream transport, the REST directory and configuration.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request could not be sent or the body read failed (DNS, refused, reset).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The server ended the event stream.
    #[error("Stream closed by server")]
    Closed,

    /// No bytes arrived within the configured idle timeout.
    #[error("Stream idle for {ms}ms")]
    IdleTimeout { ms: u64 },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A roster/options/votes request failed.
    #[error("Directory request to {url} failed: {reason}")]
    Directory { url: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Returns `true` if reconnecting could plausibly succeed.
    ///
    /// Client errors (4xx other than 408/429) mean the request itself is
    /// wrong, typically a rejected token, and are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Closed | Self::IdleTimeout { .. } => true,
            Self::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}
