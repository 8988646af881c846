use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;

fn config() -> ReliabilityConfig {
    ReliabilityConfig {
        ring_capacity: 4,
        command_ttl: Duration::from_secs(300),
        orphan_grace: Duration::from_millis(60_000),
        orphan_abort_delay: Duration::from_millis(5_000),
    }
}

#[test]
fn record_event_assigns_increasing_seq_starting_at_one() {
    let reliability = Reliability::new(config());
    reliability.register_session("s1");

    let first = reliability.record_event("s1", json!({"type": "state"})).unwrap();
    let second = reliability.record_event("s1", json!({"type": "state"})).unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[test]
fn record_event_on_unknown_session_returns_none() {
    let reliability = Reliability::new(config());
    assert!(reliability.record_event("missing", json!({"type": "state"})).is_none());
}

#[test]
fn get_replay_reflects_recorded_events() {
    let reliability = Reliability::new(config());
    reliability.register_session("s1");
    reliability.record_event("s1", json!({"type": "state", "n": 1}));
    reliability.record_event("s1", json!({"type": "state", "n": 2}));

    let replay = reliability.get_replay("s1", 1).unwrap();
    assert!(!replay.gap);
    assert_eq!(replay.events.len(), 1);
    assert_eq!(replay.events[0].seq, 2);
}

#[test]
fn register_command_is_duplicate_and_replays_response_after_record_event() {
    let reliability = Reliability::new(config());
    reliability.register_session("s1");

    let first = reliability.register_command("s1", "cmd-1").unwrap();
    assert!(!first.duplicate);

    let seq = reliability.record_event("s1", json!({"type": "response", "id": "cmd-1", "success": true})).unwrap();

    let dup = reliability.register_command("s1", "cmd-1").unwrap();
    assert!(dup.duplicate);
    assert_eq!(dup.cached_response_seq, Some(seq));
    assert_eq!(dup.cached_response.unwrap()["success"], json!(true));
}

#[test]
fn clear_session_removes_all_state() {
    let reliability = Reliability::new(config());
    reliability.register_session("s1");
    reliability.record_event("s1", json!({"type": "state"}));
    reliability.clear_session("s1");

    assert!(reliability.record_event("s1", json!({"type": "state"})).is_none());
    assert!(reliability.get_replay("s1", 0).is_none());
    assert!(reliability.register_command("s1", "cmd-1").is_none());
}

#[tokio::test(start_paused = true)]
async fn schedule_orphan_fires_and_cancel_orphan_prevents_it() {
    let reliability = Reliability::new(config());
    reliability.register_session("s1");

    let aborted = Arc::new(AtomicBool::new(false));
    let aborted_w = Arc::clone(&aborted);
    reliability.schedule_orphan("s1", move || aborted_w.store(true, Ordering::SeqCst), || {});
    reliability.cancel_orphan("s1");

    tokio::time::advance(Duration::from_millis(60_001)).await;
    tokio::task::yield_now().await;
    assert!(!aborted.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn schedule_orphan_on_unknown_session_is_a_no_op() {
    let reliability = Reliability::new(config());
    // No register_session call; must not panic.
    reliability.schedule_orphan("ghost", || (), || ());
    reliability.cancel_orphan("ghost");
}
