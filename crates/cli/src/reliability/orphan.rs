// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellable grace → abort → stop timer pair for orphaned RPC sessions.
//!
//! Expressed as two cancellable phases bound to a single `CancellationToken`,
//! mirroring the retry-cancel token held by the host crate's `InputGate`:
//! cancellation composes cleanly with the subscriber-count transitions that
//! drive scheduling from the WebSocket layer.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub struct OrphanTimers {
    token: Option<CancellationToken>,
}

impl Default for OrphanTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl OrphanTimers {
    pub fn new() -> Self {
        Self { token: None }
    }

    pub fn is_scheduled(&self) -> bool {
        self.token.is_some()
    }

    /// Starts the grace → abort → stop sequence, replacing any timer
    /// already running. `on_abort` fires once `grace` elapses; `on_stop`
    /// fires `abort_delay` after that unless cancelled first.
    pub fn schedule<A, S>(&mut self, grace: Duration, abort_delay: Duration, on_abort: A, on_stop: S)
    where
        A: FnOnce() + Send + 'static,
        S: FnOnce() + Send + 'static,
    {
        self.cancel();
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(grace) => {}
            }
            on_abort();
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(abort_delay) => {}
            }
            on_stop();
        });
    }

    /// Cancels any scheduled timer, called the instant a subscriber
    /// re-attaches to the session.
    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
#[path = "orphan_tests.rs"]
mod tests;
