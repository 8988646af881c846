// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Owns one spawned agent child process: writes commands to its stdin as
//! NDJSON, reads events from its stdout, drains its stderr into logs, and
//! reaps its exit status without ever blocking the caller.

use std::fmt;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;

use super::protocol::{Command, Event};

#[derive(Debug)]
pub enum ProcessError {
    Spawn(std::io::Error),
    Io(std::io::Error),
    Closed,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn agent process: {e}"),
            Self::Io(e) => write!(f, "agent process io error: {e}"),
            Self::Closed => write!(f, "agent process is no longer accepting commands"),
        }
    }
}

impl std::error::Error for ProcessError {}

/// One item produced by the child's output stream: either a parsed event
/// frame, or the terminal notice that the process has exited.
#[derive(Debug)]
pub enum ChildOutcome {
    Event(Event),
    Exited { code: Option<i32>, signal: Option<i32> },
}

/// A handle to a running agent child process. Cloning is cheap; all clones
/// share the same underlying process.
#[derive(Clone)]
pub struct ChildProcess {
    command_tx: mpsc::Sender<Command>,
    kill_tx: watch::Sender<bool>,
}

impl ChildProcess {
    /// Spawns `program args...` with piped stdio and starts its writer,
    /// reader, stderr-drain, and reaper tasks. Returns the handle plus the
    /// receiver side of the event stream.
    pub async fn spawn(
        program: &str,
        args: &[String],
    ) -> Result<(Self, mpsc::Receiver<ChildOutcome>), ProcessError> {
        let mut command = TokioCommand::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(ProcessError::Spawn)?;
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let (command_tx, command_rx) = mpsc::channel::<Command>(64);
        let (outcome_tx, outcome_rx) = mpsc::channel::<ChildOutcome>(256);
        let (kill_tx, kill_rx) = watch::channel(false);

        tokio::spawn(writer_task(stdin, command_rx));
        tokio::spawn(reader_task(stdout, outcome_tx.clone()));
        tokio::spawn(stderr_drain_task(stderr));
        tokio::spawn(reaper_task(child, kill_rx, outcome_tx));

        Ok((Self { command_tx, kill_tx }, outcome_rx))
    }

    pub async fn send(&self, command: Command) -> Result<(), ProcessError> {
        self.command_tx.send(command).await.map_err(|_| ProcessError::Closed)
    }

    /// Graceful-then-forced shutdown: writes an `abort` command, waits
    /// `grace`, then signals the reaper task to kill the process outright
    /// if it has not already exited.
    pub async fn stop(&self, command_id: &str, grace: Duration) {
        let _ = self.send(Command::abort(command_id)).await;
        tokio::time::sleep(grace).await;
        self.request_kill();
    }

    /// Signals the reaper task to kill the process immediately, skipping
    /// the graceful `abort` round trip.
    pub fn request_kill(&self) {
        let _ = self.kill_tx.send(true);
    }
}

async fn writer_task(mut stdin: tokio::process::ChildStdin, mut command_rx: mpsc::Receiver<Command>) {
    while let Some(command) = command_rx.recv().await {
        let mut line = match serde_json::to_vec(command.value()) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize rpc command");
                continue;
            }
        };
        line.push(b'\n');
        if let Err(err) = stdin.write_all(&line).await {
            tracing::warn!(error = %err, "failed to write rpc command to child stdin");
            return;
        }
    }
}

async fn reader_task(stdout: tokio::process::ChildStdout, outcome_tx: mpsc::Sender<ChildOutcome>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str(&line) {
                    Ok(value) => {
                        if outcome_tx.send(ChildOutcome::Event(Event::from_value(value))).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, line = %line, "failed to parse rpc event frame");
                    }
                }
            }
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read from child stdout");
                return;
            }
        }
    }
}

async fn stderr_drain_task(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::warn!(child_stderr = %line, "agent process stderr");
    }
}

async fn wait_for_kill(kill_rx: &mut watch::Receiver<bool>) {
    loop {
        if *kill_rx.borrow() {
            return;
        }
        if kill_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn reaper_task(
    mut child: tokio::process::Child,
    mut kill_rx: watch::Receiver<bool>,
    outcome_tx: mpsc::Sender<ChildOutcome>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = wait_for_kill(&mut kill_rx) => {
            if let Err(err) = child.start_kill() {
                tracing::warn!(error = %err, "failed to send kill to agent process");
            }
            child.wait().await
        }
    };

    let outcome = match status {
        Ok(status) => {
            tracing::info!(status = %status, "agent process exited");
            ChildOutcome::Exited { code: status.code(), signal: exit_signal(&status) }
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to wait on agent process");
            ChildOutcome::Exited { code: None, signal: None }
        }
    };
    let _ = outcome_tx.send(outcome).await;
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
