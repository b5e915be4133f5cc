//! `StreamSession` — per-connection state and frame dispatch.
//!
//! A session owns everything one stream connection mutates: the frame
//! parser, the vote ledger, the heartbeat monitor and the counters. It is
//! driven by a single consumer, one chunk at a time, so frames are applied
//! strictly in arrival order.
//!
//! ```text
//! chunk ──► EventFrameParser ──► StreamEvent::decode ──┬─► connected    → outcome.connected
//!                                                      ├─► initial_data → VoteLedger::seed
//!                                                      ├─► new_vote     → VoteLedger::insert
//!                                                      ├─► heartbeat    → HeartbeatMonitor::touch
//!                                                      └─► unknown      → ignored
//! ```
//!
//! Payload errors are logged and counted, and the next frame is processed.

use tracing::{debug, info, warn};

use crate::event::StreamEvent;
use crate::frame::{EventFrameParser, Frame};
use crate::heartbeat::HeartbeatMonitor;
use crate::ledger::VoteLedger;
use crate::tally;
use crate::types::{StreamMetrics, TallyEntry, UnitRecord, UnitVoteStatus, VoteRecord, VotingOption};
use crate::units;

/// What a batch of frames did to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Frames parsed out of the input.
    pub frames: usize,
    /// Derived views need recomputing.
    pub ledger_changed: bool,
    /// A `connected` frame was seen.
    pub connected: bool,
}

impl IngestOutcome {
    fn merge(&mut self, other: IngestOutcome) {
        self.frames += other.frames;
        self.ledger_changed |= other.ledger_changed;
        self.connected |= other.connected;
    }
}

#[derive(Debug, Default)]
pub struct StreamSession {
    parser: EventFrameParser,
    ledger: VoteLedger,
    heartbeat: HeartbeatMonitor,
    metrics: StreamMetrics,
    /// Votes known from outside the stream, shown until `initial_data` lands.
    fallback: Vec<VoteRecord>,
}

impl StreamSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that reports `fallback` until the stream delivers its snapshot.
    pub fn with_fallback(fallback: Vec<VoteRecord>) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    /// Parse one body chunk and apply every complete frame in it.
    pub fn ingest(&mut self, chunk: &[u8]) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();
        for frame in self.parser.push(chunk) {
            outcome.merge(self.apply_frame(&frame));
        }
        outcome
    }

    /// End of body: apply a trailing frame that lacked its final newline.
    pub fn finish(&mut self) -> IngestOutcome {
        match self.parser.finish() {
            Some(frame) => self.apply_frame(&frame),
            None => IngestOutcome::default(),
        }
    }

    /// Decode and apply a single frame. Never fails.
    pub fn apply_frame(&mut self, frame: &Frame) -> IngestOutcome {
        self.metrics.frames_received += 1;
        let mut outcome = IngestOutcome {
            frames: 1,
            ..IngestOutcome::default()
        };

        match StreamEvent::decode(frame) {
            Ok(event) => {
                let applied = self.apply(event);
                outcome.ledger_changed = applied.ledger_changed;
                outcome.connected = applied.connected;
            }
            Err(e) => {
                self.metrics.parse_errors += 1;
                warn!(event = %frame.event, error = %e, "skipping malformed frame");
            }
        }
        outcome
    }

    /// Apply an already-decoded event.
    pub fn apply(&mut self, event: StreamEvent) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();
        match event {
            StreamEvent::Connected => {
                outcome.connected = true;
            }
            StreamEvent::InitialData(votes) => {
                let offered = votes.len();
                let added = self.ledger.seed(votes);
                self.metrics.votes_ingested += added as u64;
                self.metrics.duplicates_absorbed += (offered - added) as u64;
                info!(offered, added, total = self.ledger.len(), "initial vote snapshot applied");
                // switching from fallback to the ledger changes the views even if nothing was added
                outcome.ledger_changed = true;
            }
            StreamEvent::NewVote(vote) => {
                let vote_id = vote.id;
                if self.ledger.insert(vote) {
                    self.metrics.votes_ingested += 1;
                    outcome.ledger_changed = true;
                    debug!(vote_id, total = self.ledger.len(), "vote ingested");
                } else {
                    self.metrics.duplicates_absorbed += 1;
                }
            }
            StreamEvent::Heartbeat { timestamp } => {
                self.heartbeat.touch();
                self.metrics.heartbeats += 1;
                debug!(timestamp = timestamp.as_deref().unwrap_or("-"), "heartbeat");
            }
            StreamEvent::Unknown(name) => {
                self.metrics.unknown_events += 1;
                debug!(event = %name, "ignoring unknown event");
            }
        }
        outcome
    }

    /// The votes the views are computed from.
    ///
    /// Once seeded the ledger is authoritative. Before that, the fallback set
    /// is merged with whatever the stream has delivered (fallback first,
    /// deduplicated by id).
    pub fn effective_votes(&self) -> Vec<VoteRecord> {
        if self.ledger.is_seeded() || self.fallback.is_empty() {
            return self.ledger.snapshot();
        }
        let mut merged = VoteLedger::new();
        for vote in self.fallback.iter().chain(self.ledger.records()) {
            merged.insert(vote.clone());
        }
        merged.snapshot()
    }

    pub fn tallies(&self, options: &[VotingOption]) -> Vec<TallyEntry> {
        tally::aggregate(options, &self.effective_votes())
    }

    pub fn unit_statuses(&self, units: &[UnitRecord], options: &[VotingOption]) -> Vec<UnitVoteStatus> {
        units::resolve(units, options, &self.effective_votes())
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: &str = r#"{"id":1,"voting_id":10,"resident_id":10,"voting_option_id":1,"voted_at":"2024-03-01T12:00:00Z"}"#;
    const V2: &str = r#"{"id":2,"voting_id":10,"resident_id":11,"voting_option_id":2,"voted_at":"2024-03-01T12:01:00Z"}"#;

    fn sse(event: &str, data: &str) -> String {
        format!("event: {event}\ndata: {data}\n\n")
    }

    #[test]
    fn connected_frame_is_reported() {
        let mut s = StreamSession::new();
        let out = s.ingest(sse("connected", "{}").as_bytes());
        assert!(out.connected);
        assert!(!out.ledger_changed);
        assert_eq!(out.frames, 1);
    }

    #[test]
    fn duplicate_new_vote_does_not_change_ledger() {
        let mut s = StreamSession::new();
        assert!(s.ingest(sse("new_vote", V1).as_bytes()).ledger_changed);
        let again = s.ingest(sse("new_vote", V1).as_bytes());
        assert!(!again.ledger_changed);
        assert_eq!(s.ledger().len(), 1);
        assert_eq!(s.metrics().duplicates_absorbed, 1);
    }

    #[test]
    fn malformed_frame_is_counted_and_skipped() {
        let mut s = StreamSession::new();
        let input = format!("{}{}{}", sse("new_vote", V1), sse("new_vote", "{oops"), sse("new_vote", V2));
        let out = s.ingest(input.as_bytes());
        assert_eq!(out.frames, 3);
        assert_eq!(s.ledger().len(), 2);
        assert_eq!(s.metrics().parse_errors, 1);
    }

    #[test]
    fn heartbeat_and_unknown_events() {
        let mut s = StreamSession::new();
        let input = format!("{}{}", sse("heartbeat", r#"{"timestamp":"x"}"#), sse("voting_closed", "{}"));
        let out = s.ingest(input.as_bytes());
        assert!(!out.ledger_changed);
        assert_eq!(s.heartbeat().beats(), 1);
        assert_eq!(s.metrics().heartbeats, 1);
        assert_eq!(s.metrics().unknown_events, 1);
    }

    #[test]
    fn fallback_is_shown_until_snapshot_arrives() {
        let fallback_vote = {
            let mut s = StreamSession::new();
            s.ingest(sse("new_vote", V1).as_bytes());
            s.ledger().snapshot()
        };
        let mut s = StreamSession::with_fallback(fallback_vote);
        assert_eq!(s.effective_votes().len(), 1);

        // streamed vote before the snapshot is merged with the fallback
        s.ingest(sse("new_vote", V2).as_bytes());
        assert_eq!(s.effective_votes().len(), 2);

        // an empty snapshot is authoritative: the fallback vote disappears
        let out = s.ingest(sse("initial_data", r#"{"votes":[]}"#).as_bytes());
        assert!(out.ledger_changed);
        let ids: Vec<i64> = s.effective_votes().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn finish_applies_unterminated_frame() {
        let mut s = StreamSession::new();
        s.ingest(format!("event: new_vote\ndata: {V1}").as_bytes());
        assert!(s.ledger().is_empty());
        assert!(s.finish().ledger_changed);
        assert_eq!(s.ledger().len(), 1);
    }
}
