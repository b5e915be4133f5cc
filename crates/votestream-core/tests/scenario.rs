//! Whole-session scenarios: frames in, tallies and unit statuses out.

use votestream_core::{
    tally, units, StreamSession, UnitRecord, VotingOption,
};

fn sse(event: &str, data: &str) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

fn wire_vote(id: i64, resident: i64, option: i64) -> String {
    format!(
        r#"{{"id":{id},"voting_id":10,"resident_id":{resident},"voting_option_id":{option},"voted_at":"2024-03-01T12:00:{:02}Z"}}"#,
        id % 60
    )
}

fn options() -> Vec<VotingOption> {
    vec![VotingOption::new(1, "Yes", "Y"), VotingOption::new(2, "No", "N")]
}

fn roster() -> Vec<UnitRecord> {
    vec![
        UnitRecord::occupied(1, "101", 10, "Ana"),
        UnitRecord::occupied(2, "102", 11, "Ben"),
        UnitRecord::occupied(3, "103", 12, "Cleo"),
    ]
}

#[test]
fn snapshot_then_new_vote_then_duplicate() {
    let mut session = StreamSession::new();
    let stream = [
        sse("connected", "{}"),
        sse("initial_data", &format!(r#"{{"votes":[{}]}}"#, wire_vote(1, 10, 1))),
        sse("new_vote", &wire_vote(2, 11, 2)),
        sse("new_vote", &wire_vote(1, 10, 1)),
    ]
    .concat();

    let outcome = session.ingest(stream.as_bytes());
    assert!(outcome.connected);
    assert_eq!(outcome.frames, 4);

    let ids: Vec<i64> = session.ledger().records().iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let tallies = session.tallies(&options());
    assert_eq!(tallies.len(), 2);
    assert_eq!((tallies[0].option_id, tallies[0].vote_count), (1, 1));
    assert_eq!((tallies[1].option_id, tallies[1].vote_count), (2, 1));
    assert!((tallies[0].percentage - 50.0).abs() < 1e-9);
    assert!((tallies[1].percentage - 50.0).abs() < 1e-9);

    let statuses = session.unit_statuses(&roster(), &options());
    assert_eq!(statuses[0].voted_option.as_ref().map(|o| o.text.as_str()), Some("Yes"));
    assert_eq!(statuses[1].voted_option.as_ref().map(|o| o.text.as_str()), Some("No"));
    assert!(!statuses[2].has_voted);
    assert_eq!(units::voted_count(&statuses), 2);
}

#[test]
fn invalid_json_between_valid_votes() {
    let mut session = StreamSession::new();
    let stream = [
        sse("new_vote", &wire_vote(1, 10, 1)),
        sse("new_vote", r#"{"id":3,"voting_id":"#),
        sse("new_vote", &wire_vote(2, 11, 2)),
    ]
    .concat();

    session.ingest(stream.as_bytes());
    assert_eq!(session.ledger().len(), 2);
    assert_eq!(session.metrics().parse_errors, 1);
}

#[test]
fn byte_by_byte_delivery_matches_single_chunk() {
    let stream = [
        sse("initial_data", &format!(r#"{{"votes":[{},{}]}}"#, wire_vote(1, 10, 1), wire_vote(2, 11, 1))),
        sse("heartbeat", r#"{"timestamp":"2024-03-01T12:00:30Z"}"#),
        sse("new_vote", &wire_vote(3, 12, 2)),
    ]
    .concat();

    let mut whole = StreamSession::new();
    whole.ingest(stream.as_bytes());

    let mut trickle = StreamSession::new();
    for byte in stream.as_bytes() {
        trickle.ingest(std::slice::from_ref(byte));
    }

    assert_eq!(whole.ledger().snapshot(), trickle.ledger().snapshot());
    assert_eq!(trickle.heartbeat().beats(), 1);
}

#[test]
fn tally_sum_tracks_ledger_after_every_chunk() {
    let frames: Vec<String> = (1..=40)
        .map(|i| {
            // every fifth frame re-delivers the previous vote
            let id = if i % 5 == 0 { i - 1 } else { i };
            sse("new_vote", &wire_vote(id, 100 + id, 1 + id % 2))
        })
        .collect();

    let mut session = StreamSession::new();
    for frame in &frames {
        session.ingest(frame.as_bytes());
        let tallies = session.tallies(&options());
        assert_eq!(tally::total_votes(&tallies), session.ledger().len() as u64);
        for entry in &tallies {
            assert!((0.0..=100.0).contains(&entry.percentage));
        }
    }
    assert_eq!(session.ledger().len(), 32);
}

#[test]
fn snapshot_survives_unreadable_timestamps() {
    let odd = r#"{"id":2,"voting_id":10,"resident_id":11,"voting_option_id":2,"voted_at":"sometime on friday"}"#;
    let null = r#"{"id":3,"voting_id":10,"resident_id":12,"voting_option_id":2,"voted_at":null}"#;
    let short_offset = r#"{"id":4,"voting_id":10,"resident_id":13,"voting_option_id":1,"voted_at":"2024-03-01 12:00:00+00"}"#;
    let stream = [
        sse(
            "initial_data",
            &format!(r#"{{"votes":[{},{odd},{null}]}}"#, wire_vote(1, 10, 1)),
        ),
        sse("new_vote", short_offset),
    ]
    .concat();

    let mut session = StreamSession::new();
    session.ingest(stream.as_bytes());

    assert!(session.ledger().is_seeded());
    assert_eq!(session.ledger().len(), 4);
    assert_eq!(session.metrics().parse_errors, 0);

    let records = session.ledger().records();
    assert!(records[1].voted_at.is_none());
    assert!(records[2].voted_at.is_none());
    assert!(records[3].voted_at.is_some());

    let statuses = session.unit_statuses(&roster(), &options());
    assert!(statuses.iter().all(|s| s.has_voted));
    assert!(statuses[1].voted_at.is_none());
}
