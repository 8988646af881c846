// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session command-id dedupe cache with TTL eviction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

struct CommandEntry {
    first_seen_at: Instant,
    cached_response: Option<Value>,
    cached_response_seq: Option<u64>,
}

pub struct RegisterOutcome {
    pub duplicate: bool,
    pub cached_response: Option<Value>,
    pub cached_response_seq: Option<u64>,
}

pub struct CommandRegistry {
    ttl: Duration,
    entries: HashMap<String, CommandEntry>,
}

impl CommandRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    /// Evicts entries older than the configured TTL as of `now`, then
    /// looks up `command_id`: if present, reports it as a duplicate along
    /// with any cached response; otherwise inserts a fresh entry.
    pub fn register(&mut self, command_id: &str, now: Instant) -> RegisterOutcome {
        self.entries.retain(|_, e| now.duration_since(e.first_seen_at) < self.ttl);

        if let Some(entry) = self.entries.get(command_id) {
            return RegisterOutcome {
                duplicate: true,
                cached_response: entry.cached_response.clone(),
                cached_response_seq: entry.cached_response_seq,
            };
        }

        self.entries.insert(
            command_id.to_owned(),
            CommandEntry { first_seen_at: now, cached_response: None, cached_response_seq: None },
        );
        RegisterOutcome { duplicate: false, cached_response: None, cached_response_seq: None }
    }

    /// Caches a `response` event's payload against the command id it
    /// answers, so a later duplicate submission can be re-delivered it
    /// instead of re-executing.
    pub fn record_response(&mut self, command_id: &str, response: Value, seq: u64) {
        if let Some(entry) = self.entries.get_mut(command_id) {
            entry.cached_response = Some(response);
            entry.cached_response_seq = Some(seq);
        }
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
