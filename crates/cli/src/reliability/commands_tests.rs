use std::time::{Duration, Instant};

use serde_json::json;

use super::*;

#[test]
fn first_registration_is_not_duplicate() {
    let mut registry = CommandRegistry::new(Duration::from_secs(300));
    let outcome = registry.register("c1", Instant::now());
    assert!(!outcome.duplicate);
    assert!(outcome.cached_response.is_none());
}

#[test]
fn second_registration_within_ttl_is_duplicate() {
    let mut registry = CommandRegistry::new(Duration::from_secs(300));
    let now = Instant::now();
    registry.register("c1", now);
    let outcome = registry.register("c1", now);
    assert!(outcome.duplicate);
}

#[test]
fn duplicate_replays_cached_response() {
    let mut registry = CommandRegistry::new(Duration::from_secs(300));
    let now = Instant::now();
    registry.register("c1", now);
    registry.record_response("c1", json!({"type": "response", "id": "c1", "success": true}), 6);

    let outcome = registry.register("c1", now);
    assert!(outcome.duplicate);
    assert_eq!(outcome.cached_response_seq, Some(6));
    assert_eq!(outcome.cached_response.unwrap()["success"], json!(true));
}

#[test]
fn entries_past_ttl_are_evicted_and_no_longer_duplicate() {
    let mut registry = CommandRegistry::new(Duration::from_millis(10));
    let t0 = Instant::now();
    registry.register("c1", t0);

    let later = t0 + Duration::from_millis(50);
    let outcome = registry.register("c1", later);
    assert!(!outcome.duplicate);
}
