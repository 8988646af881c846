// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Thin, allocation-cheap views over the NDJSON frames exchanged with the
//! agent child process. Neither type owns a schema: both wrap whatever
//! `serde_json::Value` the wire actually carried and expose the handful of
//! fields the reliability and gateway layers need to read.

use serde_json::{json, Value};

/// A command frame written to the child's stdin.
#[derive(Debug, Clone)]
pub struct Command(Value);

impl Command {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn abort(id: &str) -> Self {
        Self(json!({ "type": "abort", "id": id }))
    }

    pub fn get_state(id: &str) -> Self {
        Self(json!({ "type": "get_state", "id": id }))
    }

    /// The session file path named in a `switch_session` command, checking
    /// the field aliases the agent protocol accepts.
    pub fn session_file_hint(&self) -> Option<&str> {
        if self.kind() != Some("switch_session") {
            return None;
        }
        ["path", "sessionPath", "sessionFile"]
            .iter()
            .find_map(|field| self.0.get(*field).and_then(Value::as_str))
    }
}

/// An event frame read from the child's stdout.
#[derive(Debug, Clone)]
pub struct Event(Value);

impl Event {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn process_crashed(session_id: &str, detail: &str) -> Self {
        Self(json!({ "type": "process_crashed", "sessionId": session_id, "detail": detail }))
    }

    pub fn session_stopped(session_id: &str) -> Self {
        Self(json!({ "type": "session_stopped", "sessionId": session_id }))
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
