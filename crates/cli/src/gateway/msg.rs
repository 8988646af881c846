// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Frame shapes for the browser ↔ server WebSocket multiplexer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    RpcPing {
        #[serde(default)]
        ts: Option<Value>,
    },
    RpcCommand {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        session_file: Option<String>,
        #[serde(default)]
        last_event_seq: Option<u64>,
        command: Value,
    },
    ExtensionUiResponse {
        session_id: String,
        id: String,
        value: Value,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    SessionStarted {
        session_id: String,
        session_file: String,
    },
    RpcSessionNotFound {
        session_id: String,
    },
    RpcReplayGap {
        session_id: String,
        oldest_seq: u64,
        latest_seq: u64,
    },
    RpcPong {
        #[serde(skip_serializing_if = "Option::is_none")]
        ts: Option<Value>,
    },
    Error {
        code: &'static str,
        message: String,
    },
    RpcEvent {
        session_id: String,
        seq: u64,
        event: Value,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        replay: bool,
    },
    UiEvent {
        name: String,
        at: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

#[cfg(test)]
#[path = "msg_tests.rs"]
mod tests;
