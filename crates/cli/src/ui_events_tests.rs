use std::time::Duration;

use serde_json::json;

use super::*;

#[tokio::test]
async fn emit_delivers_name_timestamp_and_data_to_subscribers() {
    let ui_events = UiEvents::new(8);
    let mut rx1 = ui_events.subscribe();
    let mut rx2 = ui_events.subscribe();

    ui_events.emit("sessions_changed", Some(json!({"sessionId": "s1"})));

    for rx in [&mut rx1, &mut rx2] {
        match rx.recv().await.unwrap() {
            ServerMessage::UiEvent { name, data, .. } => {
                assert_eq!(name, "sessions_changed");
                assert_eq!(data, Some(json!({"sessionId": "s1"})));
            }
            other => panic!("expected UiEvent, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn emit_with_no_subscribers_does_not_panic() {
    let ui_events = UiEvents::new(8);
    ui_events.emit("git_context_changed", None);
}

#[test]
fn git_context_watcher_detects_first_read_and_ignores_unchanged_reads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("git-context.json");
    std::fs::write(&path, r#"{"cwd":"/a"}"#).unwrap();

    let mut watcher = GitContextWatcher::new(path.clone());
    assert!(watcher.changed());
    assert!(!watcher.changed());

    std::thread::sleep(Duration::from_millis(10));
    std::fs::write(&path, r#"{"cwd":"/b"}"#).unwrap();
    assert!(watcher.changed());
}

#[test]
fn git_context_watcher_reports_no_change_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let mut watcher = GitContextWatcher::new(path);
    assert!(!watcher.changed());
}
