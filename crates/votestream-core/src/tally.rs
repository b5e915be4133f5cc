//! `TallyAggregator` — per-option vote counts and percentages.

use std::collections::{HashMap, HashSet};

use crate::types::{TallyEntry, VoteRecord, VotingOption};

/// Count votes per option.
///
/// One entry per option, in option order. The percentage denominator is the
/// number of votes in `ledger`, not the number of eligible units. Votes for
/// an option id missing from `options` get trailing entries (first-seen
/// order) so the counts always sum to `ledger.len()`. An option id listed
/// twice gets a single entry at its first position.
pub fn aggregate(options: &[VotingOption], ledger: &[VoteRecord]) -> Vec<TallyEntry> {
    let total = ledger.len();

    let mut counts: HashMap<i64, u64> = HashMap::with_capacity(options.len());
    let mut unlisted: Vec<i64> = Vec::new();
    for vote in ledger {
        let count = counts.entry(vote.option_id).or_insert(0);
        if *count == 0 && !options.iter().any(|o| o.id == vote.option_id) {
            unlisted.push(vote.option_id);
        }
        *count += 1;
    }

    if !unlisted.is_empty() {
        tracing::warn!(?unlisted, "votes reference options missing from the option list");
    }

    let mut seen: HashSet<i64> = HashSet::with_capacity(options.len());
    options
        .iter()
        .map(|o| o.id)
        .filter(|id| seen.insert(*id))
        .chain(unlisted)
        .map(|option_id| {
            let vote_count = counts.get(&option_id).copied().unwrap_or(0);
            TallyEntry {
                option_id,
                vote_count,
                percentage: percentage(vote_count, total),
            }
        })
        .collect()
}

/// Sum of all entry counts.
pub fn total_votes(entries: &[TallyEntry]) -> u64 {
    entries.iter().map(|e| e.vote_count).sum()
}

fn percentage(count: u64, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn vote(id: i64, option: i64) -> VoteRecord {
        VoteRecord {
            id,
            voting_id: 1,
            participant_id: id + 100,
            option_id: option,
            voted_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    fn yes_no() -> Vec<VotingOption> {
        vec![VotingOption::new(1, "Yes", "Y"), VotingOption::new(2, "No", "N")]
    }

    #[test]
    fn empty_ledger_has_zero_percentages() {
        let tally = aggregate(&yes_no(), &[]);
        assert_eq!(tally.len(), 2);
        assert!(tally.iter().all(|t| t.vote_count == 0 && t.percentage == 0.0));
    }

    #[test]
    fn counts_and_percentages() {
        let ledger = vec![vote(1, 1), vote(2, 1), vote(3, 2), vote(4, 1)];
        let tally = aggregate(&yes_no(), &ledger);
        assert_eq!(tally[0].option_id, 1);
        assert_eq!(tally[0].vote_count, 3);
        assert!((tally[0].percentage - 75.0).abs() < f64::EPSILON);
        assert_eq!(tally[1].vote_count, 1);
        assert!((tally[1].percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(total_votes(&tally), ledger.len() as u64);
    }

    #[test]
    fn unlisted_option_keeps_sum_equal_to_ledger() {
        let ledger = vec![vote(1, 1), vote(2, 7), vote(3, 7)];
        let tally = aggregate(&yes_no(), &ledger);
        assert_eq!(tally.len(), 3);
        assert_eq!(tally[2].option_id, 7);
        assert_eq!(tally[2].vote_count, 2);
        assert_eq!(total_votes(&tally), 3);
    }

    #[test]
    fn repeated_option_id_is_counted_once() {
        let options = vec![
            VotingOption::new(1, "Yes", "Y"),
            VotingOption::new(2, "No", "N"),
            VotingOption::new(1, "Yes (again)", "Y"),
        ];
        let ledger = vec![vote(1, 1), vote(2, 2), vote(3, 1)];
        let tally = aggregate(&options, &ledger);
        let ids: Vec<i64> = tally.iter().map(|t| t.option_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(total_votes(&tally), ledger.len() as u64);
    }

    #[test]
    fn percentages_stay_in_bounds() {
        let ledger: Vec<_> = (0..37).map(|i| vote(i, 1 + i % 3)).collect();
        let options = vec![
            VotingOption::new(1, "A", "a"),
            VotingOption::new(2, "B", "b"),
            VotingOption::new(3, "C", "c"),
        ];
        for entry in aggregate(&options, &ledger) {
            assert!((0.0..=100.0).contains(&entry.percentage), "{entry:?}");
        }
    }
}
