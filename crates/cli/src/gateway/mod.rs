// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Browser ↔ server WebSocket multiplexer: one connection carries many RPC
//! session subscriptions, serves pings, replays from a client-known
//! sequence, and emits gap markers.

pub mod msg;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::reliability::Reliability;
use crate::rpc::protocol::Command;
use crate::rpc::{Manager, StampedEvent};
use crate::auth;
use msg::{ClientMessage, ServerMessage};

/// Everything the gateway needs to spawn/reuse RPC sessions and fan out
/// their events, independent of the rest of the application's state.
pub struct GatewayState {
    pub manager: Arc<Manager>,
    pub reliability: Arc<Reliability>,
    pub ui_events: broadcast::Sender<ServerMessage>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if let Err(_code) = auth::validate_ws_auth(query.token.as_deref().unwrap_or(""), state.auth_token.as_deref()) {
        return axum::http::Response::builder()
            .status(401)
            .body(axum::body::Body::from("unauthorized"))
            .unwrap_or_default()
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(state, socket)).into_response()
}

/// Per-session forwarder: streams stamped events from the manager's
/// broadcast channel into this connection's outbound queue.
fn spawn_forwarder(
    mut rx: broadcast::Receiver<StampedEvent>,
    session_id: String,
    outbound_tx: mpsc::Sender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(stamped) => {
                    let msg = ServerMessage::RpcEvent {
                        session_id: session_id.clone(),
                        seq: stamped.seq,
                        event: stamped.event,
                        replay: false,
                    };
                    if outbound_tx.send(msg).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
}

async fn handle_connection(state: Arc<GatewayState>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(256);
    let mut subscriptions: HashMap<String, JoinHandle<()>> = HashMap::new();
    let mut ui_rx = state.ui_events.subscribe();

    loop {
        tokio::select! {
            ui_msg = ui_rx.recv() => {
                match ui_msg {
                    Ok(msg) => {
                        if send_json(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            out = outbound_rx.recv() => {
                match out {
                    Some(msg) => {
                        if send_json(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break };
                let Ok(incoming) = incoming else { break };
                let Message::Text(text) = incoming else { continue };
                let client_msg: ClientMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(err) => {
                        let msg = ServerMessage::Error { code: "TRANSPORT", message: err.to_string() };
                        if send_json(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };
                handle_client_message(&state, client_msg, &mut subscriptions, &outbound_tx).await;
            }
        }
    }

    for (session_id, handle) in subscriptions.drain() {
        handle.abort();
        if !state.manager.has_subscribers(&session_id) {
            schedule_orphan_for(&state, session_id);
        }
    }
}

async fn handle_client_message(
    state: &Arc<GatewayState>,
    msg: ClientMessage,
    subscriptions: &mut HashMap<String, JoinHandle<()>>,
    outbound_tx: &mpsc::Sender<ServerMessage>,
) {
    match msg {
        ClientMessage::RpcPing { ts } => {
            let _ = outbound_tx.send(ServerMessage::RpcPong { ts }).await;
        }
        ClientMessage::RpcCommand { session_id, session_file, last_event_seq, command } => {
            handle_rpc_command(state, session_id, session_file, last_event_seq, command, subscriptions, outbound_tx)
                .await;
        }
        ClientMessage::ExtensionUiResponse { session_id, id, value } => {
            let forwarded = serde_json::json!({"type": "extension_ui_response", "id": id, "value": value});
            let _ = state.manager.send_command(&session_id, Command::from_value(forwarded)).await;
        }
    }
}

async fn handle_rpc_command(
    state: &Arc<GatewayState>,
    session_id: Option<String>,
    session_file: Option<String>,
    last_event_seq: Option<u64>,
    command: serde_json::Value,
    subscriptions: &mut HashMap<String, JoinHandle<()>>,
    outbound_tx: &mpsc::Sender<ServerMessage>,
) {
    if !command.get("type").map(|v| v.is_string()).unwrap_or(false) {
        let msg = ServerMessage::Error { code: "TRANSPORT", message: "command.type must be a string".into() };
        let _ = outbound_tx.send(msg).await;
        return;
    }
    let command = Command::from_value(command);

    let session_id = match session_id {
        Some(id) => {
            if state.manager.subscribe(&id).is_none() {
                let msg = ServerMessage::RpcSessionNotFound { session_id: id };
                let _ = outbound_tx.send(msg).await;
                return;
            }
            id
        }
        None => {
            let file = session_file
                .or_else(|| command.session_file_hint().map(str::to_owned))
                .unwrap_or_default();
            let existing = state.manager.find_session_by_file(&file);
            let (id, reused) = match existing {
                Some(id) => (id, true),
                None => {
                    let id = uuid::Uuid::new_v4().to_string();
                    if state.manager.start_session(&id).await.is_err() {
                        let msg = ServerMessage::Error { code: "CHILD_DIED", message: "failed to start agent process".into() };
                        let _ = outbound_tx.send(msg).await;
                        return;
                    }
                    (id, false)
                }
            };

            // Subscribe before any synthetic command is forwarded, so this
            // connection never misses that command's echoed event.
            state.reliability.cancel_orphan(&id);
            if let Some(rx) = state.manager.subscribe(&id) {
                let handle = spawn_forwarder(rx, id.clone(), outbound_tx.clone());
                subscriptions.insert(id.clone(), handle);
            }

            let started = ServerMessage::SessionStarted { session_id: id.clone(), session_file: file.clone() };
            let _ = outbound_tx.send(started).await;
            if reused {
                let _ = state.manager.send_command(&id, Command::get_state("rpc-reuse")).await;
            } else {
                let _ = state
                    .manager
                    .send_command(&id, Command::from_value(serde_json::json!({
                        "type": "switch_session",
                        "path": file,
                    })))
                    .await;
            }
            id
        }
    };

    if !subscriptions.contains_key(&session_id) {
        state.reliability.cancel_orphan(&session_id);
        if let Some(rx) = state.manager.subscribe(&session_id) {
            let handle = spawn_forwarder(rx, session_id.clone(), outbound_tx.clone());
            subscriptions.insert(session_id.clone(), handle);
        }
    }

    if let Some(last_seq) = last_event_seq {
        if let Some(replay) = state.reliability.get_replay(&session_id, last_seq) {
            if replay.gap {
                let gap_msg = ServerMessage::RpcReplayGap {
                    session_id: session_id.clone(),
                    oldest_seq: replay.oldest_seq,
                    latest_seq: replay.latest_seq,
                };
                let _ = outbound_tx.send(gap_msg).await;
            }
            for buffered in replay.events {
                let msg = ServerMessage::RpcEvent {
                    session_id: session_id.clone(),
                    seq: buffered.seq,
                    event: buffered.event,
                    replay: true,
                };
                let _ = outbound_tx.send(msg).await;
            }
        }
    }

    if command.kind() == Some("switch_session") {
        return;
    }

    if let Some(command_id) = command.id() {
        if let Some(outcome) = state.reliability.register_command(&session_id, command_id) {
            if outcome.duplicate {
                if let (Some(response), Some(seq)) = (outcome.cached_response, outcome.cached_response_seq) {
                    let msg = ServerMessage::RpcEvent { session_id: session_id.clone(), seq, event: response, replay: false };
                    let _ = outbound_tx.send(msg).await;
                }
                return;
            }
        }
    }

    let _ = state.manager.send_command(&session_id, command).await;
}

/// Schedules the orphan grace/abort/stop sequence for a session whose
/// subscriber count just dropped to zero, wiring the abort and stop hooks
/// back into the RPC manager.
fn schedule_orphan_for(state: &Arc<GatewayState>, session_id: String) {
    let manager_abort = Arc::clone(&state.manager);
    let session_abort = session_id.clone();
    let manager_stop = Arc::clone(&state.manager);
    let session_stop = session_id.clone();

    state.reliability.schedule_orphan(
        &session_id,
        move || {
            tokio::spawn(async move {
                let _ = manager_abort.send_command(&session_abort, Command::abort("orphan-abort")).await;
            });
        },
        move || {
            tokio::spawn(async move {
                manager_stop.stop_session(&session_stop, "orphan-stop").await;
            });
        },
    );
}

async fn send_json<S>(tx: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(msg) {
        Ok(t) => t,
        Err(_) => return Err(()),
    };
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
