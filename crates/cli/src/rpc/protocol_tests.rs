use serde_json::json;

use super::*;

#[test]
fn command_exposes_kind_and_id() {
    let cmd = Command::from_value(json!({"type": "prompt", "id": "c1", "text": "hi"}));
    assert_eq!(cmd.kind(), Some("prompt"));
    assert_eq!(cmd.id(), Some("c1"));
}

#[test]
fn abort_and_get_state_builders_shape_expected_frames() {
    let abort = Command::abort("c1");
    assert_eq!(abort.kind(), Some("abort"));
    assert_eq!(abort.id(), Some("c1"));

    let get_state = Command::get_state("c2");
    assert_eq!(get_state.kind(), Some("get_state"));
    assert_eq!(get_state.id(), Some("c2"));
}

#[test]
fn session_file_hint_checks_field_aliases() {
    let via_path = Command::from_value(json!({"type": "switch_session", "path": "/a.jsonl"}));
    assert_eq!(via_path.session_file_hint(), Some("/a.jsonl"));

    let via_session_path =
        Command::from_value(json!({"type": "switch_session", "sessionPath": "/b.jsonl"}));
    assert_eq!(via_session_path.session_file_hint(), Some("/b.jsonl"));

    let via_session_file =
        Command::from_value(json!({"type": "switch_session", "sessionFile": "/c.jsonl"}));
    assert_eq!(via_session_file.session_file_hint(), Some("/c.jsonl"));
}

#[test]
fn session_file_hint_is_none_for_other_command_kinds() {
    let cmd = Command::from_value(json!({"type": "prompt", "path": "/a.jsonl"}));
    assert!(cmd.session_file_hint().is_none());
}

#[test]
fn event_builders_shape_expected_frames() {
    let crashed = Event::process_crashed("s1", "exit code 1");
    assert_eq!(crashed.kind(), Some("process_crashed"));
    assert_eq!(crashed.value()["sessionId"], json!("s1"));

    let stopped = Event::session_stopped("s1");
    assert_eq!(stopped.kind(), Some("session_stopped"));
}
