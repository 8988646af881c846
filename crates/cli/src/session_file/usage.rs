// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alias-tolerant usage extraction for assistant messages on a session path.
//!
//! Source session logs come from several agent versions and forks, each of
//! which has named token/cost fields slightly differently. This module is
//! the single place that knows the alias table; nothing else should parse a
//! `usage` object directly.

use serde_json::Value;

/// Token/cost delta parsed from one assistant message's `usage` object.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageDelta {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost_usd: f64,
}

/// Running totals across every assistant message on a linear transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

impl UsageTotals {
    pub fn accumulate(&mut self, delta: &UsageDelta) {
        self.input_tokens += delta.input_tokens;
        self.output_tokens += delta.output_tokens;
        self.cache_read_tokens += delta.cache_read_tokens;
        self.cache_write_tokens += delta.cache_write_tokens;
        self.total_tokens += delta.input_tokens + delta.output_tokens;
        self.cost_usd += delta.cost_usd;
    }
}

fn first_u64(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| obj.get(*k)).and_then(Value::as_u64)
}

fn first_f64(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k)).and_then(Value::as_f64)
}

const INPUT_KEYS: &[&str] = &["input", "input_tokens", "inputTokens", "prompt_tokens", "promptTokens"];
const OUTPUT_KEYS: &[&str] = &["output", "output_tokens", "outputTokens", "completion_tokens", "completionTokens"];
const CACHE_READ_KEYS: &[&str] =
    &["cacheRead", "cache_read", "cacheReadTokens", "cache_read_input_tokens", "cache_read_tokens"];
const CACHE_WRITE_KEYS: &[&str] = &[
    "cacheWrite",
    "cache_write",
    "cacheWriteTokens",
    "cache_creation_input_tokens",
    "cache_creation_tokens",
];
const TOTAL_KEYS: &[&str] = &["total", "totalTokens", "total_tokens", "tokens"];

/// Parse a `usage` value using the alias table, tie-breaking on a present
/// `total` field: when both parts and a total are present, the parts win
/// and the total is only used to fill in a missing output figure.
pub fn extract_usage_delta(usage: &Value) -> Option<UsageDelta> {
    let obj = usage.as_object()?;

    let input = first_u64(obj, INPUT_KEYS);
    let output = first_u64(obj, OUTPUT_KEYS);
    let total = first_u64(obj, TOTAL_KEYS);
    let cache_read = first_u64(obj, CACHE_READ_KEYS).unwrap_or(0);
    let cache_write = first_u64(obj, CACHE_WRITE_KEYS).unwrap_or(0);

    let (input, output) = match (input, output, total) {
        (Some(i), Some(o), _) => (i, o),
        (Some(i), None, Some(t)) => (i, t.saturating_sub(i)),
        (None, Some(o), Some(t)) => (t.saturating_sub(o), o),
        (Some(i), None, None) => (i, 0),
        (None, Some(o), None) => (0, o),
        (None, None, Some(t)) => (t, 0),
        (None, None, None) => {
            if cache_read == 0 && cache_write == 0 {
                return None;
            }
            (0, 0)
        }
    };

    let cost_usd = extract_cost(obj).unwrap_or(0.0);

    Some(UsageDelta { input_tokens: input, output_tokens: output, cache_read_tokens: cache_read, cache_write_tokens: cache_write, cost_usd })
}

/// Cost can appear as a flat number on the usage object, nested under
/// `cost`/`costUSD` as a number, or as a breakdown object with its own
/// input/output/cacheRead/cacheWrite fields to sum.
fn extract_cost(obj: &serde_json::Map<String, Value>) -> Option<f64> {
    if let Some(flat) = first_f64(obj, &["costUSD", "cost_usd", "totalCostUsd"]) {
        return Some(flat);
    }
    match obj.get("cost") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Object(breakdown)) => {
            let input = first_f64(breakdown, &["input", "inputCost"]).unwrap_or(0.0);
            let output = first_f64(breakdown, &["output", "outputCost"]).unwrap_or(0.0);
            let cache_read = first_f64(breakdown, &["cacheRead", "cache_read"]).unwrap_or(0.0);
            let cache_write = first_f64(breakdown, &["cacheWrite", "cache_write"]).unwrap_or(0.0);
            Some(input + output + cache_read + cache_write)
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
