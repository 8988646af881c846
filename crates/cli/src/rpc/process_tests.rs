use std::time::Duration;

use serde_json::json;

use super::*;
use crate::rpc::protocol::Command;

#[tokio::test]
async fn spawned_process_echoes_written_command_back_as_event() {
    let (proc, mut outcomes) = ChildProcess::spawn("cat", &[]).await.unwrap();

    proc.send(Command::from_value(json!({"type": "prompt", "id": "c1"}))).await.unwrap();

    let outcome = outcomes.recv().await.unwrap();
    match outcome {
        ChildOutcome::Event(event) => {
            assert_eq!(event.kind(), Some("prompt"));
            assert_eq!(event.id(), Some("c1"));
        }
        ChildOutcome::Exited { .. } => panic!("expected an event, got exit"),
    }
}

#[tokio::test]
async fn request_kill_terminates_process_and_reports_exit() {
    let (proc, mut outcomes) = ChildProcess::spawn("cat", &[]).await.unwrap();
    proc.request_kill();

    let outcome = outcomes.recv().await.unwrap();
    match outcome {
        ChildOutcome::Exited { .. } => {}
        ChildOutcome::Event(_) => panic!("expected exit outcome"),
    }
}

#[tokio::test]
async fn stop_sends_abort_then_kills_after_grace() {
    let (proc, mut outcomes) = ChildProcess::spawn("cat", &[]).await.unwrap();

    proc.stop("stop-1", Duration::from_millis(10)).await;

    let mut saw_abort = false;
    let mut saw_exit = false;
    while let Some(outcome) = outcomes.recv().await {
        match outcome {
            ChildOutcome::Event(event) => {
                if event.kind() == Some("abort") {
                    saw_abort = true;
                }
            }
            ChildOutcome::Exited { .. } => {
                saw_exit = true;
                break;
            }
        }
    }
    assert!(saw_abort);
    assert!(saw_exit);
}

#[tokio::test]
async fn spawning_unknown_program_returns_spawn_error() {
    let result = ChildProcess::spawn("definitely-not-a-real-binary", &[]).await;
    assert!(matches!(result, Err(ProcessError::Spawn(_))));
}
