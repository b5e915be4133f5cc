//! Typed stream events decoded from raw frames.

use crate::error::FrameError;
use crate::frame::Frame;
use crate::types::VoteRecord;
use crate::wire::{self, HeartbeatPayload, InitialDataPayload, WireVote};

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_INITIAL_DATA: &str = "initial_data";
pub const EVENT_NEW_VOTE: &str = "new_vote";
pub const EVENT_HEARTBEAT: &str = "heartbeat";

/// An event the session knows how to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The server accepted the stream.
    Connected,
    /// Snapshot of every vote cast so far.
    InitialData(Vec<VoteRecord>),
    /// One newly cast vote.
    NewVote(VoteRecord),
    /// Liveness signal.
    Heartbeat { timestamp: Option<String> },
    /// An event type this client does not understand; ignored.
    Unknown(String),
}

impl StreamEvent {
    /// Decode a frame's JSON payload according to its event type.
    ///
    /// Unknown event types are not an error, their payload is never parsed.
    pub fn decode(frame: &Frame) -> Result<Self, FrameError> {
        let payload_err = |source| FrameError::Payload {
            event: frame.event.clone(),
            source,
        };

        match frame.event.as_str() {
            EVENT_CONNECTED => Ok(Self::Connected),
            EVENT_INITIAL_DATA => {
                let payload: InitialDataPayload =
                    serde_json::from_str(&frame.data).map_err(payload_err)?;
                Ok(Self::InitialData(wire::votes_from_wire(payload.votes)))
            }
            EVENT_NEW_VOTE => {
                let vote: WireVote = serde_json::from_str(&frame.data).map_err(payload_err)?;
                Ok(Self::NewVote(vote.into()))
            }
            EVENT_HEARTBEAT => {
                // some servers send an empty body; that is still a heartbeat
                let payload = if frame.data.trim().is_empty() {
                    HeartbeatPayload::default()
                } else {
                    serde_json::from_str::<HeartbeatPayload>(&frame.data).map_err(payload_err)?
                };
                Ok(Self::Heartbeat {
                    timestamp: payload.timestamp,
                })
            }
            other => Ok(Self::Unknown(other.to_string())),
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Connected => EVENT_CONNECTED,
            Self::InitialData(_) => EVENT_INITIAL_DATA,
            Self::NewVote(_) => EVENT_NEW_VOTE,
            Self::Heartbeat { .. } => EVENT_HEARTBEAT,
            Self::Unknown(name) => name,
        }
    }
}
