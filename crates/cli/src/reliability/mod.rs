// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session sequencing, replay, command dedupe, and orphan lifecycle —
//! the only component that knows sequence numbers and command identity.
//!
//! One `std::sync::Mutex` guards the session map; each logical operation
//! below takes and releases it without ever awaiting while held, so event
//! delivery (an async operation elsewhere) never happens while the lock is
//! taken.

pub mod commands;
pub mod orphan;
pub mod ring;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use commands::{CommandRegistry, RegisterOutcome};
use orphan::OrphanTimers;
use ring::{EventRing, ReplayResult};

#[derive(Debug, Clone)]
pub struct ReliabilityConfig {
    pub ring_capacity: usize,
    pub command_ttl: Duration,
    pub orphan_grace: Duration,
    pub orphan_abort_delay: Duration,
}

struct SessionState {
    ring: EventRing,
    commands: CommandRegistry,
    orphan: OrphanTimers,
}

pub struct Reliability {
    config: ReliabilityConfig,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl Reliability {
    pub fn new(config: ReliabilityConfig) -> Self {
        Self { config, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn register_session(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.entry(session_id.to_owned()).or_insert_with(|| SessionState {
            ring: EventRing::new(self.config.ring_capacity),
            commands: CommandRegistry::new(self.config.command_ttl),
            orphan: OrphanTimers::new(),
        });
    }

    /// Assigns the next seq to `event`, pushes it into the session's ring,
    /// and caches it against its command id if it is a `response` event.
    /// Returns `None` if the session has already been cleared.
    pub fn record_event(&self, session_id: &str, event: Value) -> Option<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let state = sessions.get_mut(session_id)?;
        let seq = state.ring.push(event.clone());
        if event.get("type").and_then(Value::as_str) == Some("response") {
            if let Some(id) = event.get("id").and_then(Value::as_str) {
                state.commands.record_response(id, event, seq);
            }
        }
        Some(seq)
    }

    pub fn register_command(&self, session_id: &str, command_id: &str) -> Option<RegisterOutcome> {
        let mut sessions = self.sessions.lock().unwrap();
        let state = sessions.get_mut(session_id)?;
        Some(state.commands.register(command_id, Instant::now()))
    }

    pub fn get_replay(&self, session_id: &str, client_last_seq: u64) -> Option<ReplayResult> {
        let sessions = self.sessions.lock().unwrap();
        let state = sessions.get(session_id)?;
        Some(state.ring.replay(client_last_seq))
    }

    /// Starts (or restarts) the orphan grace timer for a session whose
    /// subscriber count just dropped to zero.
    pub fn schedule_orphan<A, S>(&self, session_id: &str, on_abort: A, on_stop: S)
    where
        A: FnOnce() + Send + 'static,
        S: FnOnce() + Send + 'static,
    {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(state) = sessions.get_mut(session_id) {
            state.orphan.schedule(self.config.orphan_grace, self.config.orphan_abort_delay, on_abort, on_stop);
        }
    }

    /// Cancels a scheduled orphan timer, called the instant any subscriber
    /// re-attaches.
    pub fn cancel_orphan(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(state) = sessions.get_mut(session_id) {
            state.orphan.cancel();
        }
    }

    /// Removes all reliability state for a session (ring, command cache,
    /// orphan timers), called once the RPC session is fully stopped.
    pub fn clear_session(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
