//! `VoteLedger` — idempotent, append-only set of votes keyed by vote id.
//!
//! Records are kept in arrival order; the id index only answers "seen
//! before?". First write wins: a later record with a known id is dropped
//! even if its contents differ.

use std::collections::HashSet;

use crate::types::VoteRecord;

#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    records: Vec<VoteRecord>,
    ids: HashSet<i64>,
    seeded: bool,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-insert a snapshot, skipping ids already present.
    /// Returns the number of records actually added.
    pub fn seed(&mut self, records: impl IntoIterator<Item = VoteRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if self.insert(record) {
                added += 1;
            }
        }
        self.seeded = true;
        added
    }

    /// Add one record. Returns `false` (and changes nothing) for a known id.
    pub fn insert(&mut self, record: VoteRecord) -> bool {
        if !self.ids.insert(record.id) {
            tracing::debug!(vote_id = record.id, "duplicate vote absorbed");
            return false;
        }
        self.records.push(record);
        true
    }

    /// Owned copy of the ledger, for handing to another task.
    pub fn snapshot(&self) -> Vec<VoteRecord> {
        self.records.clone()
    }

    /// Borrowed view in arrival order.
    pub fn records(&self) -> &[VoteRecord] {
        &self.records
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `true` once a snapshot (`initial_data`) has been applied.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn vote(id: i64, participant: i64, option: i64) -> VoteRecord {
        VoteRecord {
            id,
            voting_id: 10,
            participant_id: participant,
            option_id: option,
            voted_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, id as u32 % 60).unwrap()),
        }
    }

    #[test]
    fn insert_is_idempotent() {
        let mut ledger = VoteLedger::new();
        assert!(ledger.insert(vote(1, 10, 1)));
        assert!(!ledger.insert(vote(1, 10, 1)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn first_write_wins() {
        let mut ledger = VoteLedger::new();
        ledger.insert(vote(1, 10, 1));
        ledger.insert(vote(1, 99, 2));
        assert_eq!(ledger.records()[0].participant_id, 10);
        assert_eq!(ledger.records()[0].option_id, 1);
    }

    #[test]
    fn seed_skips_known_and_repeated_ids() {
        let mut ledger = VoteLedger::new();
        ledger.insert(vote(2, 11, 2));
        assert!(!ledger.is_seeded());

        let added = ledger.seed(vec![vote(1, 10, 1), vote(2, 11, 2), vote(1, 10, 1)]);
        assert_eq!(added, 1);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_seeded());
        assert!(ledger.contains(1) && ledger.contains(2));
    }

    #[test]
    fn snapshot_preserves_arrival_order() {
        let mut ledger = VoteLedger::new();
        for id in [5, 3, 9] {
            ledger.insert(vote(id, id, 1));
        }
        let ids: Vec<i64> = ledger.snapshot().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn empty_seed_still_marks_seeded() {
        let mut ledger = VoteLedger::new();
        assert_eq!(ledger.seed(Vec::new()), 0);
        assert!(ledger.is_seeded());
        assert!(ledger.is_empty());
    }
}
