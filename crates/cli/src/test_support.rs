// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Builders and helpers for constructing application state and a live
//! server in integration tests. Not behind `#[cfg(test)]` so that tests
//! under `tests/` (a separate compilation unit from `src/`) can depend
//! on it too.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::reliability::{Reliability, ReliabilityConfig};
use crate::review::store::JsonlReviewStore;
use crate::review::{ReviewBus, ReviewBusConfig};
use crate::rpc::{Manager, ManagerConfig};
use crate::state::{AppConfig, AppState};
use crate::ui_events::UiEvents;

/// Builds an [`AppState`] rooted at a caller-owned directory, with
/// defaults sized for fast single-process tests rather than production.
pub struct AppStateBuilder {
    home: PathBuf,
    repo_root: PathBuf,
    auth_token: Option<String>,
    agent_command: String,
    agent_args: Vec<String>,
    event_buffer_size: usize,
}

impl AppStateBuilder {
    /// `home` doubles as the review store root and the rho home
    /// directory; pass a fresh `tempfile::tempdir()` path per test.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            repo_root: home.clone(),
            home,
            auth_token: None,
            agent_command: "true".to_owned(),
            agent_args: Vec::new(),
            event_buffer_size: 256,
        }
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn repo_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_root = path.into();
        self
    }

    pub fn agent_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.agent_command = command.into();
        self.agent_args = args;
        self
    }

    pub fn event_buffer_size(mut self, n: usize) -> Self {
        self.event_buffer_size = n;
        self
    }

    pub fn build(self) -> std::io::Result<Arc<AppState>> {
        let reliability = Arc::new(Reliability::new(ReliabilityConfig {
            ring_capacity: self.event_buffer_size,
            command_ttl: Duration::from_secs(300),
            orphan_grace: Duration::from_secs(60),
            orphan_abort_delay: Duration::from_secs(5),
        }));

        let manager = Manager::new(
            ManagerConfig {
                agent_command: self.agent_command,
                agent_args: self.agent_args,
                stop_grace: Duration::from_secs(5),
                broadcast_capacity: 256,
            },
            Arc::clone(&reliability),
        );

        let ui_events = UiEvents::new(self.event_buffer_size);

        let review_store = JsonlReviewStore::new(self.home.join("submissions.jsonl"))?;
        let review = ReviewBus::new(
            ReviewBusConfig {
                open_ttl: Duration::from_secs(86_400),
                post_completion_ttl: Duration::from_secs(1_800),
                max_file_bytes: 512_000,
            },
            Arc::new(review_store),
            ui_events.sender(),
        );

        let config = AppConfig {
            sessions_root: self.home.join("sessions"),
            repo_root: self.repo_root,
            auth_token: self.auth_token,
            debug_timing: false,
        };

        AppState::new_with_default_stubs(config, manager, reliability, review, ui_events, &self.home)
    }
}

/// Serve the full router on an ephemeral loopback port and hand back the
/// bound address plus the serving task, so a test can connect with a
/// real HTTP or WebSocket client and shut the task down by dropping it.
pub async fn spawn_http_server(state: Arc<AppState>) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = crate::http::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}
