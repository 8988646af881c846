use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;

use super::*;
use crate::reliability::{Reliability, ReliabilityConfig};
use crate::review::store::JsonlReviewStore;
use crate::review::{ReviewBus, ReviewBusConfig};
use crate::rpc::{Manager, ManagerConfig};
use crate::state::AppConfig;
use crate::ui_events::UiEvents;

fn test_state(sessions_root: std::path::PathBuf) -> Arc<AppState> {
    let reliability = Arc::new(Reliability::new(ReliabilityConfig {
        ring_capacity: 16,
        command_ttl: Duration::from_secs(300),
        orphan_grace: Duration::from_secs(60),
        orphan_abort_delay: Duration::from_secs(5),
    }));
    let manager =
        Manager::new(ManagerConfig { agent_command: "cat".into(), agent_args: vec![], stop_grace: Duration::from_millis(50), broadcast_capacity: 32 }, Arc::clone(&reliability));
    let ui_events = UiEvents::new(16);
    let store = JsonlReviewStore::new(sessions_root.join("reviews.jsonl")).unwrap();
    let review = ReviewBus::new(ReviewBusConfig::default(), Arc::new(store), ui_events.sender());

    AppState::new_with_default_stubs(
        AppConfig { sessions_root: sessions_root.clone(), repo_root: std::path::PathBuf::from("."), auth_token: None, debug_timing: false },
        manager,
        reliability,
        review,
        ui_events,
        &sessions_root,
    )
    .unwrap()
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/fork", post(fork_session))
        .route("/api/sessions/new", post(new_session))
        .with_state(state)
}

fn write_session(dir: &std::path::Path, cwd: &str, filename: &str, id: &str) {
    let path = dir.join(filename);
    let header = serde_json::json!({"type": "session", "id": id, "version": 1, "timestamp": "2025-01-01T00-00-00-000Z", "cwd": cwd});
    let prompt = serde_json::json!({"type": "message", "id": "u1", "role": "user", "text": "hello", "content": "hello"});
    std::fs::write(&path, format!("{}\n{}\n", header, prompt)).unwrap();
}

#[tokio::test]
async fn list_sessions_reports_total_count_header() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_session(dir.path(), "/repo", "2025-01-01T00-00-00-000Z_s1.jsonl", "s1");
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.get("/api/sessions").await;
    res.assert_status(StatusCode::OK);
    assert_eq!(res.header("x-total-count"), "1");
    Ok(())
}

#[tokio::test]
async fn get_session_returns_parsed_transcript() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_session(dir.path(), "/repo", "2025-01-01T00-00-00-000Z_s1.jsonl", "s1");
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.get("/api/sessions/s1").await;
    res.assert_status(StatusCode::OK);
    let body: serde_json::Value = res.json();
    assert_eq!(body["header"]["id"], "s1");
    Ok(())
}

#[tokio::test]
async fn get_session_unknown_id_is_404() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.get("/api/sessions/ghost").await;
    res.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn fork_session_creates_new_file_at_entry_id() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_session(dir.path(), "/repo", "2025-01-01T00-00-00-000Z_s1.jsonl", "s1");
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.post("/api/sessions/s1/fork").json(&serde_json::json!({"entryId": "u1"})).await;
    res.assert_status(StatusCode::OK);
    let body: serde_json::Value = res.json();
    assert!(body["id"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn new_session_writes_header_only_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.post("/api/sessions/new").json(&serde_json::json!({"cwd": "/repo"})).await;
    res.assert_status(StatusCode::OK);
    let body: serde_json::Value = res.json();
    let file = body["file"].as_str().unwrap();
    let contents = std::fs::read_to_string(file)?;
    assert_eq!(contents.lines().count(), 1);
    Ok(())
}

#[test]
fn filename_timestamp_matches_session_log_shape() {
    let ts = filename_timestamp();
    // e.g. "2025-02-04T12-30-45-123Z"
    assert_eq!(ts.len(), 24);
    assert!(ts.ends_with('Z'));
    assert_eq!(&ts[4..5], "-");
    assert_eq!(&ts[10..11], "T");
}

#[test]
fn civil_from_days_matches_known_epoch_dates() {
    assert_eq!(civil_from_days(0), (1970, 1, 1));
    assert_eq!(civil_from_days(19716), (2023, 12, 25));
}
