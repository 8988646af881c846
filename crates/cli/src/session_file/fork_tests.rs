use std::io::Write;

use serde_json::json;
use tempfile::tempdir;

use super::*;

fn write_lines(path: &Path, lines: &[Value]) {
    let mut file = fs::File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{}", serde_json::to_string(line).unwrap()).unwrap();
    }
}

fn source_session(dir: &Path) -> PathBuf {
    let path = dir.join("2025-02-04T12-30-45-123Z_src.jsonl");
    write_lines(
        &path,
        &[
            json!({"type": "session", "id": "src", "cwd": "/home/user/project", "version": 2}),
            json!({"type": "message", "id": "u1", "role": "user", "content": [{"text": "first"}]}),
            json!({"type": "message", "id": "a1", "parentId": "u1", "role": "assistant", "content": [{"text": "reply"}]}),
            json!({"type": "message", "id": "u2", "parentId": "a1", "role": "user", "content": [{"text": "second"}]}),
            json!({"type": "message", "id": "a2", "parentId": "u2", "role": "assistant", "content": [{"text": "reply2"}]}),
        ],
    );
    path
}

#[test]
fn forks_at_named_entry_and_writes_parent_session() {
    let dir = tempdir().unwrap();
    let src = source_session(dir.path());

    let outcome =
        fork::fork_session(dir.path(), &src, Some("u1"), "new1", "2025-02-04T13-00-00-000Z").unwrap();

    let result = read_session(&outcome.path).unwrap();
    assert_eq!(result.header.id, "new1");
    assert_eq!(result.header.parent_session.as_deref(), Some("src"));
    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].id.as_deref(), Some("u1"));
}

#[test]
fn forks_at_last_fork_point_when_entry_id_omitted() {
    let dir = tempdir().unwrap();
    let src = source_session(dir.path());

    let outcome = fork::fork_session(dir.path(), &src, None, "new2", "2025-02-04T13-00-00-000Z").unwrap();

    let result = read_session(&outcome.path).unwrap();
    assert_eq!(result.messages.len(), 3);
    assert_eq!(result.messages.last().unwrap().id.as_deref(), Some("u2"));
}

#[test]
fn rejects_entry_id_that_is_not_a_fork_point() {
    let dir = tempdir().unwrap();
    let src = source_session(dir.path());

    let err = fork::fork_session(dir.path(), &src, Some("a1"), "new3", "2025-02-04T13-00-00-000Z")
        .unwrap_err();
    assert!(matches!(err, fork::ForkError::UnknownEntryId));
}

#[test]
fn fork_destination_nests_under_slashified_cwd() {
    let dir = tempdir().unwrap();
    let src = source_session(dir.path());

    let outcome = fork::fork_session(dir.path(), &src, Some("u1"), "new4", "2025-02-04T13-00-00-000Z").unwrap();

    assert!(outcome.path.starts_with(dir.path().join("home-user-project")));
}

#[test]
fn new_session_file_has_no_entries() {
    let dir = tempdir().unwrap();
    let path = fork::new_session_file(dir.path(), "/home/user/project", "brand-new", "2025-02-04T13-00-00-000Z").unwrap();

    let result = read_session(&path).unwrap();
    assert_eq!(result.header.id, "brand-new");
    assert!(result.messages.is_empty());
    assert!(result.header.parent_session.is_none());
}

#[test]
fn errors_when_source_has_no_fork_points() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("2025-02-04T12-30-45-123Z_empty.jsonl");
    write_lines(&path, &[json!({"type": "session", "id": "empty"})]);

    let err = fork::fork_session(dir.path(), &path, None, "new5", "2025-02-04T13-00-00-000Z").unwrap_err();
    assert!(matches!(err, fork::ForkError::NoForkPoint));
}
