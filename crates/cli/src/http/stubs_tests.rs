use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use super::*;
use crate::reliability::{Reliability, ReliabilityConfig};
use crate::review::store::JsonlReviewStore;
use crate::review::{ReviewBus, ReviewBusConfig};
use crate::rpc::{Manager, ManagerConfig};
use crate::state::AppConfig;
use crate::ui_events::UiEvents;

fn test_state(root: std::path::PathBuf) -> Arc<AppState> {
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
    let store = JsonlReviewStore::new(root.join("reviews.jsonl")).unwrap();
    let review = ReviewBus::new(ReviewBusConfig::default(), Arc::new(store), ui_events.sender());

    AppState::new_with_default_stubs(
        AppConfig { sessions_root: root.clone(), repo_root: root.clone(), auth_token: None, debug_timing: false },
        manager,
        reliability,
        review,
        ui_events,
        &root,
    )
    .unwrap()
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/brain", get(list_brain_entries).post(append_brain_entry))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/config", get(get_config).patch(patch_config))
        .with_state(state)
}

#[tokio::test]
async fn brain_tombstone_removes_matching_entry_from_list() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    server.post("/api/brain").json(&serde_json::json!({"id": "e1", "tag": "preference", "value": "dark mode"})).await;
    server.post("/api/brain").json(&serde_json::json!({"id": "e2", "tag": "tombstone", "targetId": "e1"})).await;

    let res = server.get("/api/brain").await;
    res.assert_status(StatusCode::OK);
    let body: serde_json::Value = res.json();
    assert!(body.as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn brain_list_filters_by_tag() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    server.post("/api/brain").json(&serde_json::json!({"id": "e1", "tag": "preference"})).await;
    server.post("/api/brain").json(&serde_json::json!({"id": "e2", "tag": "task"})).await;

    let res = server.get("/api/brain").add_query_param("tag", "task").await;
    let body: serde_json::Value = res.json();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "e2");
    Ok(())
}

#[tokio::test]
async fn tasks_create_update_delete_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let created = server.post("/api/tasks").json(&serde_json::json!({"title": "write docs"})).await;
    created.assert_status(StatusCode::OK);
    let task: serde_json::Value = created.json();
    let id = task["id"].as_str().unwrap().to_owned();

    let listed = server.get("/api/tasks").await;
    assert_eq!(listed.json::<serde_json::Value>().as_array().unwrap().len(), 1);

    let updated = server.patch(&format!("/api/tasks/{id}")).json(&serde_json::json!({"done": true})).await;
    updated.assert_status(StatusCode::OK);
    assert_eq!(updated.json::<serde_json::Value>()["done"], true);

    let deleted = server.delete(&format!("/api/tasks/{id}")).await;
    deleted.assert_status(StatusCode::NO_CONTENT);

    let after = server.get("/api/tasks").await;
    assert!(after.json::<serde_json::Value>().as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn tasks_update_unknown_id_is_404() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let res = server.patch("/api/tasks/ghost").json(&serde_json::json!({"done": true})).await;
    res.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn config_get_defaults_to_empty_object_and_patch_merges_shallow() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let state = test_state(dir.path().to_path_buf());
    let server = axum_test::TestServer::new(router(state))?;

    let initial = server.get("/api/config").await;
    assert_eq!(initial.json::<serde_json::Value>(), serde_json::json!({}));

    server.patch("/api/config").json(&serde_json::json!({"theme": "dark"})).await;
    let after_first = server.patch("/api/config").json(&serde_json::json!({"debug": true})).await;
    let value: serde_json::Value = after_first.json();
    assert_eq!(value["theme"], "dark");
    assert_eq!(value["debug"], true);
    Ok(())
}
