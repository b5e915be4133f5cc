//! Wire shapes and their translation into the domain model.
//!
//! The backend speaks snake_case and calls participants "residents":
//!
//! | wire               | domain                         |
//! |--------------------|--------------------------------|
//! | `voting_id`        | [`VoteRecord::voting_id`]      |
//! | `resident_id`      | [`VoteRecord::participant_id`] |
//! | `voting_option_id` | [`VoteRecord::option_id`]      |
//! | `voted_at`         | [`VoteRecord::voted_at`]       |
//!
//! Nothing outside this module reads wire field names.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use serde::{Deserialize, Deserializer};

use crate::types::{UnitRecord, VoteRecord, VotingOption};

/// A vote as carried by `initial_data`, `new_vote` and the fallback REST call.
#[derive(Debug, Clone, Deserialize)]
pub struct WireVote {
    pub id: i64,
    pub voting_id: i64,
    pub resident_id: i64,
    pub voting_option_id: i64,
    /// Missing, null or unreadable timestamps become `None`; the vote still counts.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub voted_at: Option<DateTime<Utc>>,
}

impl From<WireVote> for VoteRecord {
    fn from(w: WireVote) -> Self {
        Self {
            id: w.id,
            voting_id: w.voting_id,
            participant_id: w.resident_id,
            option_id: w.voting_option_id,
            voted_at: w.voted_at,
        }
    }
}

/// Payload of the `initial_data` event.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialDataPayload {
    #[serde(default)]
    pub votes: Vec<WireVote>,
}

/// Payload of the `heartbeat` event. The timestamp is informational only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A voting option as returned by the options endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WireOption {
    pub id: i64,
    #[serde(alias = "option_text")]
    pub text: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl From<WireOption> for VotingOption {
    fn from(w: WireOption) -> Self {
        Self {
            id: w.id,
            text: w.text,
            code: w.code.unwrap_or_default(),
        }
    }
}

/// A roster entry as returned by the units endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WireUnit {
    #[serde(alias = "id")]
    pub unit_id: i64,
    #[serde(alias = "number")]
    pub unit_number: String,
    #[serde(default)]
    pub resident_id: Option<i64>,
    #[serde(default)]
    pub resident_name: Option<String>,
}

impl From<WireUnit> for UnitRecord {
    fn from(w: WireUnit) -> Self {
        Self {
            unit_id: w.unit_id,
            unit_number: w.unit_number,
            participant_id: w.resident_id,
            participant_name: w.resident_name,
        }
    }
}

/// Convert a batch of wire votes, preserving order.
pub fn votes_from_wire(votes: Vec<WireVote>) -> Vec<VoteRecord> {
    votes.into_iter().map(VoteRecord::from).collect()
}

// ─── Timestamps ───────────────────────────────────────────────────────────────

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%#z",
    "%Y-%m-%d %H:%M:%S%#z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse an RFC 3339 timestamp, a `YYYY-MM-DD[ T]HH:MM:SS[.f]` with a short
/// offset such as `+00`, or the same without offset, which is taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(raw) => {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                tracing::warn!(voted_at = %raw, "unreadable vote timestamp ignored");
            }
            Ok(parsed)
        }
        other => {
            tracing::warn!(voted_at = %other, "non-string vote timestamp ignored");
            Ok(None)
        }
    }
}
