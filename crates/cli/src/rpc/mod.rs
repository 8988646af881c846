// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Owns the set of running agent child processes, stamps their output
//! events with a sequence number via the reliability layer, and fans each
//! stamped event out to whatever WebSocket connections are subscribed to
//! that session.

pub mod process;
pub mod protocol;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::reliability::Reliability;
use process::{ChildOutcome, ChildProcess, ProcessError};
use protocol::{Command, Event};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub agent_command: String,
    pub agent_args: Vec<String>,
    pub stop_grace: Duration,
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct StampedEvent {
    pub seq: u64,
    pub event: Value,
}

#[derive(Debug)]
pub enum ManagerError {
    UnknownSession,
    Process(ProcessError),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSession => write!(f, "no rpc session is running for that id"),
            Self::Process(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ManagerError {}

impl From<ProcessError> for ManagerError {
    fn from(err: ProcessError) -> Self {
        Self::Process(err)
    }
}

struct SessionEntry {
    process: ChildProcess,
    broadcast_tx: broadcast::Sender<StampedEvent>,
    session_file: Option<String>,
}

pub struct Manager {
    config: ManagerConfig,
    reliability: Arc<Reliability>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl Manager {
    pub fn new(config: ManagerConfig, reliability: Arc<Reliability>) -> Arc<Self> {
        Arc::new(Self { config, reliability, sessions: Mutex::new(HashMap::new()) })
    }

    /// Spawns the agent child process for `session_id`, registers it with
    /// the reliability layer, and starts the background pump that stamps
    /// and broadcasts its output.
    pub async fn start_session(self: &Arc<Self>, session_id: &str) -> Result<(), ManagerError> {
        let (process, outcomes) =
            ChildProcess::spawn(&self.config.agent_command, &self.config.agent_args).await?;
        let (broadcast_tx, _) = broadcast::channel(self.config.broadcast_capacity);

        self.reliability.register_session(session_id);
        self.sessions.lock().unwrap().insert(
            session_id.to_owned(),
            SessionEntry { process, broadcast_tx: broadcast_tx.clone(), session_file: None },
        );

        let manager = Arc::clone(self);
        let session_id = session_id.to_owned();
        tokio::spawn(async move { manager.pump(session_id, outcomes, broadcast_tx).await });
        Ok(())
    }

    async fn pump(
        self: Arc<Self>,
        session_id: String,
        mut outcomes: tokio::sync::mpsc::Receiver<ChildOutcome>,
        broadcast_tx: broadcast::Sender<StampedEvent>,
    ) {
        while let Some(outcome) = outcomes.recv().await {
            let event = match outcome {
                ChildOutcome::Event(event) => event.into_value(),
                ChildOutcome::Exited { code, signal } => {
                    tracing::info!(session_id = %session_id, code, signal, "agent process exited");
                    Event::process_crashed(&session_id, &format!("code={code:?} signal={signal:?}"))
                        .into_value()
                }
            };
            if let Some(seq) = self.reliability.record_event(&session_id, event.clone()) {
                let _ = broadcast_tx.send(StampedEvent { seq, event });
            }
        }
        self.sessions.lock().unwrap().remove(&session_id);
        self.reliability.clear_session(&session_id);
    }

    /// Finds the session id currently bound to `session_file`, if any.
    pub fn find_session_by_file(&self, session_file: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|(_, entry)| entry.session_file.as_deref() == Some(session_file))
            .map(|(id, _)| id.clone())
    }

    /// Sends `command` to the named session's child process, tracking a
    /// `switch_session` command's target file for [`Self::find_session_by_file`].
    pub async fn send_command(&self, session_id: &str, command: Command) -> Result<(), ManagerError> {
        let hint = command.session_file_hint().map(str::to_owned);
        let process = {
            let mut sessions = self.sessions.lock().unwrap();
            let entry = sessions.get_mut(session_id).ok_or(ManagerError::UnknownSession)?;
            if let Some(hint) = hint {
                entry.session_file = Some(hint);
            }
            entry.process.clone()
        };
        process.send(command).await?;
        Ok(())
    }

    pub fn subscribe(&self, session_id: &str) -> Option<broadcast::Receiver<StampedEvent>> {
        self.sessions.lock().unwrap().get(session_id).map(|entry| entry.broadcast_tx.subscribe())
    }

    pub fn has_subscribers(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|entry| entry.broadcast_tx.receiver_count() > 0)
            .unwrap_or(false)
    }

    /// Stops the named session's child process gracefully, escalating to a
    /// forced kill after the configured grace period.
    pub async fn stop_session(&self, session_id: &str, command_id: &str) {
        let process = self.sessions.lock().unwrap().get(session_id).map(|entry| entry.process.clone());
        if let Some(process) = process {
            process.stop(command_id, self.config.stop_grace).await;
        }
    }

    /// Kills every running session's child process outright, used during
    /// process shutdown.
    pub fn dispose(&self) {
        for (_, entry) in self.sessions.lock().unwrap().drain() {
            entry.process.request_kill();
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
