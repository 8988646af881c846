// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session ring buffer of sequenced events.
//!
//! Adapted from the host crate's byte-oriented `RingBuffer` to typed
//! `{seq, event}` entries: capacity is in event count, not bytes, and replay
//! is keyed by seq rather than a byte offset.

use std::collections::VecDeque;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct BufferedEvent {
    pub seq: u64,
    pub event: Value,
}

pub struct ReplayResult {
    pub events: Vec<BufferedEvent>,
    pub gap: bool,
    pub oldest_seq: u64,
    pub latest_seq: u64,
}

/// Fixed-capacity ring of the most recent events for one RPC session.
pub struct EventRing {
    capacity: usize,
    buf: VecDeque<BufferedEvent>,
    next_seq: u64,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), buf: VecDeque::new(), next_seq: 1 }
    }

    /// Assigns the next seq to `event`, pushes it into the ring (evicting
    /// the oldest entry once at capacity), and returns the assigned seq.
    pub fn push(&mut self, event: Value) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(BufferedEvent { seq, event });
        seq
    }

    pub fn oldest_seq(&self) -> Option<u64> {
        self.buf.front().map(|e| e.seq)
    }

    pub fn latest_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// All events with `seq > client_last_seq` still resident, with a `gap`
    /// flag set when the ring floor has already advanced past what the
    /// client can resume from.
    pub fn replay(&self, client_last_seq: u64) -> ReplayResult {
        let events: Vec<BufferedEvent> =
            self.buf.iter().filter(|e| e.seq > client_last_seq).cloned().collect();
        let gap = match self.oldest_seq() {
            Some(oldest) => client_last_seq + 1 < oldest,
            None => false,
        };
        ReplayResult {
            events,
            gap,
            oldest_seq: self.oldest_seq().unwrap_or(0),
            latest_seq: self.latest_seq(),
        }
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
