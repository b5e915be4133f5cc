//! Error types for frame decoding.

use thiserror::Error;

/// A single frame could not be turned into a stream event.
///
/// Always recoverable: the session logs it and moves on to the next frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed '{event}' payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FrameError {
    /// The event type of the offending frame.
    pub fn event(&self) -> &str {
        match self {
            Self::Payload { event, .. } => event,
        }
    }
}
