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

fn test_state(repo_root: std::path::PathBuf) -> Arc<AppState> {
    let reliability = Arc::new(Reliability::new(ReliabilityConfig {
        ring_capacity: 16,
        command_ttl: Duration::from_secs(300),
        orphan_grace: Duration::from_secs(60),
        orphan_abort_delay: Duration::from_secs(5),
    }));
    let manager = Manager::new(
        ManagerConfig { agent_command: "cat".into(), agent_args: vec![], stop_grace: Duration::from_millis(50), broadcast_capacity: 32 },
        Arc::clone(&reliability),
    );
    let ui_events = UiEvents::new(16);
    let store = JsonlReviewStore::new(repo_root.join("reviews.jsonl")).unwrap();
    let review = ReviewBus::new(ReviewBusConfig::default(), Arc::new(store), ui_events.sender());

    AppState::new_with_default_stubs(
        AppConfig { sessions_root: repo_root.clone(), repo_root: repo_root.clone(), auth_token: None, debug_timing: false },
        manager,
        reliability,
        review,
        ui_events,
        &repo_root,
    )
    .unwrap()
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/git/status", get(status))
        .route("/api/git/diff", get(diff))
        .route("/api/review/from-git", post(review_from_git))
        .with_state(state)
}

async fn init_repo(dir: &std::path::Path) {
    for args in [vec!["init", "-q"], vec!["config", "user.email", "a@b.c"], vec!["config", "user.name", "tester"]] {
        tokio::process::Command::new("git").current_dir(dir).args(args).output().await.unwrap();
    }
}

#[tokio::test]
async fn status_reports_untracked_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo(dir.path()).await;
    std::fs::write(dir.path().join("new.txt"), "hello\n")?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.get("/api/git/status").await;
    res.assert_status(StatusCode::OK);
    let body: serde_json::Value = res.json();
    let entries = body["entries"].as_array().unwrap();
    assert!(entries.iter().any(|e| e["path"] == "new.txt"));
    Ok(())
}

#[tokio::test]
async fn diff_falls_back_to_synthetic_add_for_untracked_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo(dir.path()).await;
    std::fs::write(dir.path().join("new.txt"), "hello\n")?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.get("/api/git/diff").add_query_param("file", "new.txt").await;
    res.assert_status(StatusCode::OK);
    let body: serde_json::Value = res.json();
    assert!(body["diff"].as_str().unwrap().contains("hello"));
    Ok(())
}

#[tokio::test]
async fn diff_rejects_absolute_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo(dir.path()).await;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.get("/api/git/diff").add_query_param("file", "/etc/passwd").await;
    res.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn diff_rejects_path_escaping_repo() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo(dir.path()).await;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.get("/api/git/diff").add_query_param("file", "../outside.txt").await;
    res.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn review_from_git_creates_review_from_readable_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo(dir.path()).await;
    std::fs::write(dir.path().join("a.rs"), "fn main() {}\n")?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.post("/api/review/from-git").json(&serde_json::json!({"files": ["a.rs"], "message": "please look"})).await;
    res.assert_status(StatusCode::OK);
    let body: serde_json::Value = res.json();
    assert!(body["id"].as_str().is_some());
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["url"], format!("/review/{}/ws", body["id"].as_str().unwrap()));
    Ok(())
}

#[tokio::test]
async fn review_from_git_rejects_escaping_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo(dir.path()).await;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.post("/api/review/from-git").json(&serde_json::json!({"files": ["../outside.txt"]})).await;
    res.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn review_from_git_errors_when_no_files_are_readable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo(dir.path()).await;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.post("/api/review/from-git").json(&serde_json::json!({"files": ["missing.rs"]})).await;
    res.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[test]
fn guard_repo_relative_path_accepts_plain_relative_paths() {
    assert!(guard_repo_relative_path("src/lib.rs").is_ok());
    assert!(guard_repo_relative_path("a/b/c.rs").is_ok());
}

#[test]
fn guard_repo_relative_path_rejects_nul_absolute_and_escaping() {
    assert!(guard_repo_relative_path("a\0b").is_err());
    assert!(guard_repo_relative_path("/etc/passwd").is_err());
    assert!(guard_repo_relative_path("../escape.rs").is_err());
    assert!(guard_repo_relative_path("a/../../escape.rs").is_err());
}
