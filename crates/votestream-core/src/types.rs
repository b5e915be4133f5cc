//! Domain types shared by the ledger, the derived views and the engine.
//!
//! These serialize in camelCase. The snake_case shapes that arrive on the
//! wire live in [`crate::wire`] and are converted at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── VoteRecord ───────────────────────────────────────────────────────────────

/// A single cast vote. Identity is `id`; records are immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    /// Server-assigned vote identifier.
    pub id: i64,
    /// Voting session this vote belongs to.
    pub voting_id: i64,
    /// Participant (resident) that cast the vote.
    pub participant_id: i64,
    /// Option the participant chose.
    pub option_id: i64,
    /// When the vote was cast, if the server sent a readable timestamp.
    #[serde(default)]
    pub voted_at: Option<DateTime<Utc>>,
}

// ─── VotingOption ─────────────────────────────────────────────────────────────

/// One selectable answer of a voting session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingOption {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub code: String,
}

impl VotingOption {
    pub fn new(id: i64, text: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            code: code.into(),
        }
    }
}

// ─── UnitRecord ───────────────────────────────────────────────────────────────

/// A participant slot from the roster. Vacant units have no participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRecord {
    pub unit_id: i64,
    pub unit_number: String,
    pub participant_id: Option<i64>,
    pub participant_name: Option<String>,
}

impl UnitRecord {
    /// A unit with an assigned participant.
    pub fn occupied(
        unit_id: i64,
        unit_number: impl Into<String>,
        participant_id: i64,
        participant_name: impl Into<String>,
    ) -> Self {
        Self {
            unit_id,
            unit_number: unit_number.into(),
            participant_id: Some(participant_id),
            participant_name: Some(participant_name.into()),
        }
    }

    /// A unit with nobody assigned to it.
    pub fn vacant(unit_id: i64, unit_number: impl Into<String>) -> Self {
        Self {
            unit_id,
            unit_number: unit_number.into(),
            participant_id: None,
            participant_name: None,
        }
    }
}

// ─── Derived views ────────────────────────────────────────────────────────────

/// Vote count and share for one option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyEntry {
    pub option_id: i64,
    pub vote_count: u64,
    /// `vote_count / total * 100`, or `0.0` when nobody has voted yet.
    pub percentage: f64,
}

/// Whether a unit has voted, and for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitVoteStatus {
    pub unit_id: i64,
    pub has_voted: bool,
    pub voted_option: Option<VotingOption>,
    pub voted_at: Option<DateTime<Utc>>,
}

// ─── ConnectionState ──────────────────────────────────────────────────────────

/// Health of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// What the connection-state channel publishes: the state plus the error
/// that caused the last transition to `Disconnected`, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

// ─── StreamMetrics ────────────────────────────────────────────────────────────

/// Counters for one session (or, in the engine, accumulated across sessions).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetrics {
    pub frames_received: u64,
    pub votes_ingested: u64,
    pub duplicates_absorbed: u64,
    pub parse_errors: u64,
    pub unknown_events: u64,
    pub heartbeats: u64,
    pub reconnections: u64,
}

impl StreamMetrics {
    /// Add another set of counters to this one.
    pub fn accumulate(&mut self, other: &StreamMetrics) {
        self.frames_received += other.frames_received;
        self.votes_ingested += other.votes_ingested;
        self.duplicates_absorbed += other.duplicates_absorbed;
        self.parse_errors += other.parse_errors;
        self.unknown_events += other.unknown_events;
        self.heartbeats += other.heartbeats;
        self.reconnections += other.reconnections;
    }
}
