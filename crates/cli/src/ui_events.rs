// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide UI-event fan-out: `{type:"ui_event", name, at, data?}`
//! frames broadcast to every connected gateway socket. Driven by direct
//! calls from session/review mutations and by a file watch on the rho
//! home directory's `git-context.json`.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::gateway::msg::ServerMessage;

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Thin wrapper over the broadcast channel every gateway connection
/// subscribes to. Cloning is cheap; the inner sender is reference-counted.
#[derive(Clone)]
pub struct UiEvents {
    tx: broadcast::Sender<ServerMessage>,
}

impl UiEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn sender(&self) -> broadcast::Sender<ServerMessage> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Emits a named event to every currently-subscribed socket. A send
    /// with no subscribers is not an error; dead sockets are pruned by the
    /// gateway connection loop itself when their `mpsc` forward fails.
    pub fn emit(&self, name: impl Into<String>, data: Option<Value>) {
        let _ = self.tx.send(ServerMessage::UiEvent { name: name.into(), at: now_ms(), data });
    }
}

/// Watches `git-context.json` under the rho home directory for content
/// changes, debounced at 100 ms, and emits `git_context_changed`. Uses
/// `notify` for filesystem events with a polling fallback at the same
/// cadence, the way `driver/log_watch.rs` watches session log files.
pub struct GitContextWatcher {
    path: PathBuf,
    poll_interval: Duration,
    last_modified: Option<std::time::SystemTime>,
}

impl GitContextWatcher {
    pub fn new(path: PathBuf) -> Self {
        Self { path, poll_interval: Duration::from_millis(100), last_modified: None }
    }

    fn changed(&mut self) -> bool {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        if self.last_modified == Some(modified) {
            return false;
        }
        self.last_modified = Some(modified);
        true
    }

    pub async fn run(mut self, ui_events: UiEvents, shutdown: CancellationToken) {
        let (wake_tx, mut wake_rx) = tokio::sync::mpsc::channel::<()>(1);
        let _watcher = self.setup_notify_watcher(wake_tx);

        let mut poll_interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = wake_rx.recv() => {}
                _ = poll_interval.tick() => {}
            }

            if self.changed() {
                ui_events.emit("git_context_changed", None);
            }
        }
    }

    fn setup_notify_watcher(&self, wake_tx: tokio::sync::mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
        use notify::{RecursiveMode, Watcher};

        let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
            let _ = wake_tx.try_send(());
        })
        .ok()?;

        let watch_path = self.path.parent().unwrap_or(self.path.as_ref());
        watcher.watch(watch_path, RecursiveMode::NonRecursive).ok()?;
        Some(watcher)
    }
}

#[cfg(test)]
#[path = "ui_events_tests.rs"]
mod tests;
