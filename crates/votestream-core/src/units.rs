//! `UnitStatusResolver` — joins the roster against the ledger.

use std::collections::HashMap;

use crate::types::{UnitRecord, UnitVoteStatus, VoteRecord, VotingOption};

/// Per-unit voting status, in roster order.
///
/// A unit has voted iff some ledger record carries its participant id.
/// Vacant units (no participant) never have. If a participant somehow has
/// several votes, the first in ledger order is reported. A vote whose option
/// is not in `options` still counts as voted, with `voted_option: None`.
pub fn resolve(
    units: &[UnitRecord],
    options: &[VotingOption],
    ledger: &[VoteRecord],
) -> Vec<UnitVoteStatus> {
    let mut by_participant: HashMap<i64, &VoteRecord> = HashMap::with_capacity(ledger.len());
    for vote in ledger {
        by_participant.entry(vote.participant_id).or_insert(vote);
    }

    units
        .iter()
        .map(|unit| {
            let vote = unit
                .participant_id
                .and_then(|pid| by_participant.get(&pid).copied());
            match vote {
                Some(vote) => UnitVoteStatus {
                    unit_id: unit.unit_id,
                    has_voted: true,
                    voted_option: options.iter().find(|o| o.id == vote.option_id).cloned(),
                    voted_at: vote.voted_at,
                },
                None => UnitVoteStatus {
                    unit_id: unit.unit_id,
                    has_voted: false,
                    voted_option: None,
                    voted_at: None,
                },
            }
        })
        .collect()
}

/// Number of units that have voted.
pub fn voted_count(statuses: &[UnitVoteStatus]) -> usize {
    statuses.iter().filter(|s| s.has_voted).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn vote(id: i64, participant: i64, option: i64, minute: u32) -> VoteRecord {
        VoteRecord {
            id,
            voting_id: 1,
            participant_id: participant,
            option_id: option,
            voted_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()),
        }
    }

    fn options() -> Vec<VotingOption> {
        vec![VotingOption::new(1, "Yes", "Y"), VotingOption::new(2, "No", "N")]
    }

    #[test]
    fn voted_and_not_voted() {
        let units = vec![
            UnitRecord::occupied(1, "101", 10, "Ana"),
            UnitRecord::occupied(2, "102", 11, "Ben"),
        ];
        let statuses = resolve(&units, &options(), &[vote(1, 10, 2, 5)]);
        assert!(statuses[0].has_voted);
        assert_eq!(statuses[0].voted_option.as_ref().unwrap().text, "No");
        assert_eq!(statuses[0].voted_at.unwrap().format("%M").to_string(), "05");
        assert!(!statuses[1].has_voted);
        assert!(statuses[1].voted_option.is_none());
        assert_eq!(voted_count(&statuses), 1);
    }

    #[test]
    fn vacant_unit_never_voted() {
        let units = vec![UnitRecord::vacant(3, "103")];
        let statuses = resolve(&units, &options(), &[vote(1, 10, 1, 0)]);
        assert!(!statuses[0].has_voted);
    }

    #[test]
    fn first_matching_vote_wins() {
        let units = vec![UnitRecord::occupied(1, "101", 10, "Ana")];
        let ledger = vec![vote(1, 10, 1, 1), vote(2, 10, 2, 2)];
        let statuses = resolve(&units, &options(), &ledger);
        assert_eq!(statuses[0].voted_option.as_ref().unwrap().id, 1);
    }

    #[test]
    fn unknown_option_still_counts_as_voted() {
        let units = vec![UnitRecord::occupied(1, "101", 10, "Ana")];
        let statuses = resolve(&units, &options(), &[vote(1, 10, 42, 0)]);
        assert!(statuses[0].has_voted);
        assert!(statuses[0].voted_option.is_none());
    }

    #[test]
    fn has_voted_iff_participant_in_ledger() {
        let units: Vec<_> = (0..6)
            .map(|i| UnitRecord::occupied(i, format!("{}", 100 + i), 10 + i, "x"))
            .collect();
        let ledger = vec![vote(1, 10, 1, 0), vote(2, 12, 2, 0), vote(3, 15, 1, 0)];
        for (unit, status) in units.iter().zip(resolve(&units, &options(), &ledger)) {
            let expected = ledger.iter().any(|v| Some(v.participant_id) == unit.participant_id);
            assert_eq!(status.has_voted, expected, "unit {}", unit.unit_id);
        }
    }
}
