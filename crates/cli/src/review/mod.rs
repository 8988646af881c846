// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The code-review session bus: multi-socket, single-shot completion.
//!
//! A review session holds two socket sets (tool, UI) and one terminal
//! result. It is created by the HTTP layer (tool-initiated or
//! git-initiated), lives in memory, and persists its terminal transition
//! through [`store::ReviewStore`].

pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::gateway::msg::ServerMessage;
use crate::auth;
use store::{ListReviewRecordsQuery, ReviewComment, ReviewRecordMeta, ReviewStatus, ReviewStore};

const MAX_FILE_BYTES_DEFAULT: usize = 512_000;
const BINARY_SNIFF_WINDOW: usize = 8192;

#[derive(Debug, Clone)]
pub struct ReviewBusConfig {
    pub open_ttl: Duration,
    pub post_completion_ttl: Duration,
    pub max_file_bytes: usize,
}

impl Default for ReviewBusConfig {
    fn default() -> Self {
        Self {
            open_ttl: Duration::from_secs(24 * 60 * 60),
            post_completion_ttl: Duration::from_secs(30 * 60),
            max_file_bytes: MAX_FILE_BYTES_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewFileView {
    pub file: String,
    pub language: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewServerMessage {
    Init {
        id: String,
        files: Vec<ReviewFileView>,
        warnings: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ReviewResult {
        cancelled: bool,
        comments: Vec<ReviewComment>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewClientMessage {
    Submit {
        #[serde(default)]
        comments: Vec<ReviewComment>,
    },
    Cancel {},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRole {
    Tool,
    Ui,
}

#[derive(Debug)]
pub struct CreatedReview {
    pub id: String,
    pub token: String,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub enum CreateReviewError {
    NoUsableFiles,
}

struct Session {
    token: String,
    files: Vec<ReviewFileView>,
    warnings: Vec<String>,
    message: Option<String>,
    created_at: Instant,
    done: bool,
    result: Option<(bool, Vec<ReviewComment>)>,
    tool_sockets: Vec<mpsc::UnboundedSender<Option<ReviewServerMessage>>>,
    ui_sockets: Vec<mpsc::UnboundedSender<Option<ReviewServerMessage>>>,
}

pub struct ReviewBus {
    config: ReviewBusConfig,
    sessions: Mutex<HashMap<String, Session>>,
    store: Arc<dyn ReviewStore>,
    ui_events: broadcast::Sender<ServerMessage>,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

fn detect_language(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?;
    let lang = match ext {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "rs" => "rust",
        "py" => "python",
        "go" => "go",
        "rb" => "ruby",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "md" => "markdown",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "sh" | "bash" => "shell",
        _ => return None,
    };
    Some(lang.to_owned())
}

fn is_binary(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(BINARY_SNIFF_WINDOW)];
    window.contains(&0)
}

fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

impl ReviewBus {
    pub fn new(config: ReviewBusConfig, store: Arc<dyn ReviewStore>, ui_events: broadcast::Sender<ServerMessage>) -> Arc<Self> {
        Arc::new(Self { config, sessions: Mutex::new(HashMap::new()), store, ui_events })
    }

    /// The durable store backing this bus, for read-mostly passthroughs
    /// (listing/fetching submissions) that don't need the in-memory socket
    /// state.
    pub fn store(&self) -> &Arc<dyn ReviewStore> {
        &self.store
    }

    /// Creates a review session from raw file candidates, applying the
    /// size and binary-heuristic guards and attaching warnings for any
    /// path that is skipped. Fails only if every candidate is rejected.
    pub fn create_review(
        self: &Arc<Self>,
        id: String,
        candidates: Vec<(String, Vec<u8>)>,
        message: Option<String>,
    ) -> Result<CreatedReview, CreateReviewError> {
        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for (path, bytes) in candidates {
            if bytes.len() > self.config.max_file_bytes {
                warnings.push(format!("Skipped: {path} (too large)"));
                continue;
            }
            if is_binary(&bytes) {
                warnings.push(format!("Skipped: {path} (binary file)"));
                continue;
            }
            let content = String::from_utf8_lossy(&bytes).into_owned();
            files.push(ReviewFileView { language: detect_language(&path), file: path, content });
        }

        if files.is_empty() {
            return Err(CreateReviewError::NoUsableFiles);
        }

        let token = mint_token();
        let meta = ReviewRecordMeta {
            id: id.clone(),
            files: files.iter().map(|f| f.file.clone()).collect(),
            warnings: warnings.clone(),
            message: message.clone(),
            created_at_ms: now_ms(),
        };
        let _ = self.store.create_review_record(meta);

        self.sessions.lock().unwrap().insert(
            id.clone(),
            Session {
                token: token.clone(),
                files,
                warnings: warnings.clone(),
                message,
                created_at: Instant::now(),
                done: false,
                result: None,
                tool_sockets: Vec::new(),
                ui_sockets: Vec::new(),
            },
        );

        let bus = Arc::clone(self);
        let open_ttl = self.config.open_ttl;
        let ttl_id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(open_ttl).await;
            bus.auto_cancel_if_open(&ttl_id);
        });

        Ok(CreatedReview { id, token, warnings })
    }

    fn auto_cancel_if_open(self: &Arc<Self>, id: &str) {
        let should_cancel = {
            let sessions = self.sessions.lock().unwrap();
            sessions.get(id).map(|s| !s.done).unwrap_or(false)
        };
        if should_cancel {
            self.terminate(id, true, Vec::new());
        }
    }

    /// Records the terminal transition, persists it, broadcasts the result
    /// to tool sockets, closes UI sockets, and schedules memory eviction.
    fn terminate(self: &Arc<Self>, id: &str, cancelled: bool, comments: Vec<ReviewComment>) {
        let (tool_sockets, ui_sockets) = {
            let mut sessions = self.sessions.lock().unwrap();
            let Some(session) = sessions.get_mut(id) else { return };
            if session.done {
                return;
            }
            session.done = true;
            session.result = Some((cancelled, comments.clone()));
            (session.tool_sockets.clone(), std::mem::take(&mut session.ui_sockets))
        };

        if cancelled {
            let _ = self.store.cancel_review_record(id);
        } else {
            let _ = self.store.submit_review_record(id, comments.clone());
        }

        let result_msg = ReviewServerMessage::ReviewResult { cancelled, comments };
        for tx in &tool_sockets {
            let _ = tx.send(Some(result_msg.clone()));
        }
        for tx in &ui_sockets {
            let _ = tx.send(None);
        }

        let _ = self.ui_events.send(ServerMessage::UiEvent {
            name: "review_sessions_changed".into(),
            at: now_ms(),
            data: None,
        });
        let _ = self.ui_events.send(ServerMessage::UiEvent {
            name: "review_submissions_changed".into(),
            at: now_ms(),
            data: None,
        });

        let bus = Arc::clone(self);
        let id = id.to_owned();
        let post_completion_ttl = self.config.post_completion_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(post_completion_ttl).await;
            bus.sessions.lock().unwrap().remove(&id);
        });
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewWsQuery {
    pub token: String,
    pub role: String,
}

pub async fn ws_handler(
    State(bus): State<Arc<ReviewBus>>,
    axum::extract::Path(id): axum::extract::Path<String>,
    Query(query): Query<ReviewWsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let role = match query.role.as_str() {
        "tool" => SocketRole::Tool,
        "ui" => SocketRole::Ui,
        _ => {
            return axum::http::Response::builder()
                .status(400)
                .body(axum::body::Body::from("invalid role"))
                .unwrap_or_default()
                .into_response();
        }
    };

    let session_token = {
        let sessions = bus.sessions.lock().unwrap();
        sessions.get(&id).map(|s| s.token.clone())
    };
    let Some(session_token) = session_token else {
        return axum::http::Response::builder()
            .status(404)
            .body(axum::body::Body::from("not found"))
            .unwrap_or_default()
            .into_response();
    };
    if auth::validate_ws_auth(&query.token, Some(&session_token)).is_err() {
        return axum::http::Response::builder()
            .status(401)
            .body(axum::body::Body::from("unauthorized"))
            .unwrap_or_default()
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(bus, id, role, socket)).into_response()
}

async fn handle_connection(bus: Arc<ReviewBus>, id: String, role: SocketRole, socket: WebSocket) {
    let (mut tx, mut rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Option<ReviewServerMessage>>();

    let initial = {
        let mut sessions = bus.sessions.lock().unwrap();
        let Some(session) = sessions.get_mut(&id) else { return };
        if session.done {
            let (cancelled, comments) = session.result.clone().unwrap_or((true, Vec::new()));
            ReviewServerMessage::ReviewResult { cancelled, comments }
        } else {
            match role {
                SocketRole::Tool => session.tool_sockets.push(outbound_tx.clone()),
                SocketRole::Ui => session.ui_sockets.push(outbound_tx.clone()),
            }
            ReviewServerMessage::Init {
                id: id.clone(),
                files: session.files.clone(),
                warnings: session.warnings.clone(),
                message: session.message.clone(),
            }
        }
    };
    if send_json(&mut tx, &initial).await.is_err() {
        return;
    }

    let mut submitted = false;
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(Some(msg)) => {
                        if send_json(&mut tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Some(None) | None => break,
                }
            }
            incoming = rx.next() => {
                let Some(Ok(incoming)) = incoming else { break };
                let Message::Text(text) = incoming else { continue };
                if role != SocketRole::Ui || submitted {
                    continue;
                }
                match serde_json::from_str::<ReviewClientMessage>(&text) {
                    Ok(ReviewClientMessage::Submit { comments }) => {
                        if comments.iter().any(|c| c.start_line > c.end_line) {
                            continue;
                        }
                        submitted = true;
                        bus.terminate(&id, false, comments);
                    }
                    Ok(ReviewClientMessage::Cancel {}) => {
                        submitted = true;
                        bus.terminate(&id, true, Vec::new());
                    }
                    Err(_) => continue,
                }
            }
        }
    }
}

async fn send_json<S>(tx: &mut S, msg: &ReviewServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
