// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses append-only, tree-structured JSONL session logs into a linear
//! transcript, extracting fork points and usage stats along the way.
//!
//! Entries form a tree via `parentId`; the *current linear transcript* is
//! the path from a chosen leaf to the root, reversed. Nothing here rewrites
//! a session file — they are append-only and owned by the spawned agent
//! process (see [`crate::rpc`]).

pub mod fork;
pub mod usage;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;

use usage::{extract_usage_delta, UsageTotals};

const SKIP_DIR_NAMES: &[&str] = &["subagent-artifacts", ".git", "node_modules"];

#[derive(Debug)]
pub enum SessionFileError {
    Io(std::io::Error),
    NotFound,
}

impl std::fmt::Display for SessionFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::NotFound => write!(f, "session file not found"),
        }
    }
}

impl std::error::Error for SessionFileError {}

impl From<std::io::Error> for SessionFileError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// The first line of a session log.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHeader {
    pub id: String,
    pub version: Option<i64>,
    pub timestamp: Option<String>,
    pub cwd: Option<String>,
    pub parent_session: Option<String>,
}

/// A single message materialized from the linear transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedMessage {
    pub id: Option<String>,
    pub role: String,
    /// Opaque payload, passed through unchanged — see DESIGN NOTES on
    /// opaque JSON: the reader only ever inspects `type`/`id`/`parentId`.
    pub content: Value,
    pub timestamp: Option<String>,
}

/// A user-role entry on the linear transcript; the only valid fork target.
#[derive(Debug, Clone, Serialize)]
pub struct ForkPoint {
    pub entry_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub message_count: usize,
    pub usage: UsageTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadSessionResult {
    pub header: SessionHeader,
    pub messages: Vec<ParsedMessage>,
    pub fork_points: Vec<ForkPoint>,
    pub stats: SessionStats,
    pub name: Option<String>,
}

/// Lightweight summary used by both `listSessions` and `getSessionInfo`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub file: PathBuf,
    pub cwd: Option<String>,
    pub timestamp: Option<String>,
    pub parent_session: Option<String>,
    pub name: Option<String>,
    pub first_prompt: Option<String>,
    pub message_count: usize,
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSessionsResult {
    pub total: usize,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Default)]
pub struct ListSessionsQuery {
    pub cwd: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

/// Raw entry as read off a session log line. Keeps the parsed routing
/// fields plus the full `raw` value so content round-trips unchanged.
struct Entry {
    kind: String,
    id: Option<String>,
    parent_id: Option<String>,
    raw: Value,
}

fn entry_from_value(v: Value) -> Entry {
    let kind = v.get("type").and_then(Value::as_str).unwrap_or("").to_owned();
    let id = v.get("id").and_then(Value::as_str).map(str::to_owned);
    let parent_id = v.get("parentId").and_then(Value::as_str).map(str::to_owned);
    Entry { kind, id, parent_id, raw: v }
}

/// Reads every line of `path`, skipping malformed JSON (not fatal). Returns
/// the header (if the first line is a `session` record) and the remaining
/// entries in file order.
fn read_entries(path: &Path) -> Result<(Option<Value>, Vec<Entry>), SessionFileError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut header = None;
    let mut entries = Vec::new();

    if let Some(first) = lines.next() {
        let first = first?;
        if let Ok(v) = serde_json::from_str::<Value>(&first) {
            if v.get("type").and_then(Value::as_str) == Some("session") {
                header = Some(v);
            } else {
                entries.push(entry_from_value(v));
            }
        }
    }

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(v) = serde_json::from_str::<Value>(&line) {
            entries.push(entry_from_value(v));
        }
    }

    Ok((header, entries))
}

fn header_from_value(v: &Value, filename_fallback: &str) -> SessionHeader {
    let id = v
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| filename_id(filename_fallback));
    SessionHeader {
        id,
        version: v.get("version").and_then(Value::as_i64),
        timestamp: v.get("timestamp").and_then(Value::as_str).map(str::to_owned),
        cwd: v.get("cwd").and_then(Value::as_str).map(str::to_owned),
        parent_session: v.get("parentSession").and_then(Value::as_str).map(str::to_owned),
    }
}

/// Filenames encode `<timestamp>_<id>.jsonl`; used both as a header
/// fallback and for `findSessionFileById`'s substring match.
fn filename_id(filename: &str) -> String {
    filename
        .strip_suffix(".jsonl")
        .and_then(|s| s.rsplit_once('_'))
        .map(|(_, id)| id.to_owned())
        .unwrap_or_else(|| filename.to_owned())
}

/// Finds the leaf: the last non-`label` entry with an id, scanning from
/// the end of the file.
fn find_leaf(entries: &[Entry]) -> Option<usize> {
    entries.iter().rposition(|e| e.kind != "label" && e.id.is_some())
}

/// Walks `parentId` from `leaf` to the root, cycle-guarded by a visited
/// set even though the tree should never contain cycles. Returns indices
/// in root-to-leaf order.
fn walk_to_root(entries: &[Entry], by_id: &HashMap<&str, usize>, leaf: usize) -> Vec<usize> {
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = Some(leaf);

    while let Some(idx) = cursor {
        let Some(id) = entries[idx].id.as_deref() else {
            path.push(idx);
            break;
        };
        if !visited.insert(id.to_owned()) {
            break;
        }
        path.push(idx);
        cursor = entries[idx].parent_id.as_deref().and_then(|pid| by_id.get(pid).copied());
    }

    path.reverse();
    path
}

fn first_nonempty_text(raw: &Value) -> String {
    if let Some(s) = raw.get("text").and_then(Value::as_str) {
        if !s.is_empty() {
            return s.to_owned();
        }
    }
    if let Some(arr) = raw.get("content").and_then(Value::as_array) {
        for fragment in arr {
            if let Some(s) = fragment.get("text").and_then(Value::as_str) {
                if !s.is_empty() {
                    return s.to_owned();
                }
            }
        }
    }
    String::new()
}

fn role_of(raw: &Value) -> String {
    raw.get("role").and_then(Value::as_str).unwrap_or("unknown").to_owned()
}

/// Reads a full session file into its linear transcript, fork points, and
/// accumulated usage stats.
pub fn read_session(path: &Path) -> Result<ReadSessionResult, SessionFileError> {
    let (header_value, entries) = read_entries(path)?;
    let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or("");

    let header = match header_value {
        Some(v) => header_from_value(&v, filename),
        None => SessionHeader {
            id: filename_id(filename),
            version: None,
            timestamp: None,
            cwd: None,
            parent_session: None,
        },
    };

    let by_id: HashMap<&str, usize> =
        entries.iter().enumerate().filter_map(|(i, e)| e.id.as_deref().map(|id| (id, i))).collect();

    let Some(leaf) = find_leaf(&entries) else {
        return Ok(ReadSessionResult {
            header,
            messages: vec![],
            fork_points: vec![],
            stats: SessionStats::default(),
            name: None,
        });
    };

    let path_indices = walk_to_root(&entries, &by_id, leaf);

    // Truncate at the last compaction before the leaf: a synthesized
    // summary replaces everything before the kept range.
    let last_compaction = path_indices.iter().rposition(|&idx| entries[idx].kind == "compaction");

    let mut messages = Vec::new();
    let visible: Vec<usize> = match last_compaction {
        Some(pos) => {
            let compaction = &entries[path_indices[pos]];
            let summary_text =
                compaction.raw.get("summary").and_then(Value::as_str).unwrap_or("").to_owned();
            messages.push(ParsedMessage {
                id: compaction.id.clone(),
                role: "summary".to_owned(),
                content: Value::String(summary_text),
                timestamp: compaction.raw.get("timestamp").and_then(Value::as_str).map(str::to_owned),
            });

            let first_kept_id =
                compaction.raw.get("firstKeptEntryId").and_then(Value::as_str).map(str::to_owned);
            match first_kept_id.and_then(|id| path_indices.iter().position(|&i| entries[i].id.as_deref() == Some(id.as_str()))) {
                Some(kept_pos) => path_indices[kept_pos..].to_vec(),
                None => path_indices[pos + 1..].to_vec(),
            }
        }
        None => path_indices.clone(),
    };

    let mut fork_points = Vec::new();
    let mut usage_totals = UsageTotals::default();

    for &idx in &visible {
        let entry = &entries[idx];
        match entry.kind.as_str() {
            "message" => {
                let role = role_of(&entry.raw);
                if role == "user" {
                    if let Some(id) = &entry.id {
                        fork_points.push(ForkPoint { entry_id: id.clone(), text: first_nonempty_text(&entry.raw) });
                    }
                }
                if role == "assistant" {
                    if let Some(usage) = entry.raw.get("usage") {
                        if let Some(delta) = extract_usage_delta(usage) {
                            usage_totals.accumulate(&delta);
                        }
                    }
                }
                messages.push(ParsedMessage {
                    id: entry.id.clone(),
                    role,
                    content: entry.raw.get("content").cloned().unwrap_or(Value::Null),
                    timestamp: entry.raw.get("timestamp").and_then(Value::as_str).map(str::to_owned),
                });
            }
            "custom_message" => {
                messages.push(ParsedMessage {
                    id: entry.id.clone(),
                    role: "custom".to_owned(),
                    content: entry.raw.get("content").cloned().unwrap_or(Value::Null),
                    timestamp: entry.raw.get("timestamp").and_then(Value::as_str).map(str::to_owned),
                });
            }
            _ => {}
        }
    }

    let message_count = messages.len();
    let name = header_value_name(path);

    Ok(ReadSessionResult {
        header,
        messages,
        fork_points,
        stats: SessionStats { message_count, usage: usage_totals },
        name,
    })
}

fn header_value_name(_path: &Path) -> Option<String> {
    None
}

/// Matches header `id` exactly across every session file under `root`;
/// falls back to filename substring match when no header matches.
pub fn find_session_file_by_id(root: &Path, id: &str) -> Option<PathBuf> {
    let mut fallback = None;
    for path in walk_session_files(root) {
        if let Ok((Some(header), _)) = read_entries(&path) {
            if header.get("id").and_then(Value::as_str) == Some(id) {
                return Some(path);
            }
        }
        if fallback.is_none() {
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                if name.contains(id) {
                    fallback = Some(path.clone());
                }
            }
        }
    }
    fallback
}

fn is_session_filename(name: &str) -> bool {
    name.ends_with(".jsonl") && name.rfind('_').is_some_and(|i| i > 0)
}

fn walk_session_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(read_dir) = fs::read_dir(&dir) else { continue };
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
                if !SKIP_DIR_NAMES.contains(&name) {
                    stack.push(path);
                }
            } else if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                if is_session_filename(name) {
                    out.push(path);
                }
            }
        }
    }
    out
}

/// Streams a session file's header and message count without loading the
/// full transcript, caching by mtime so repeated list calls are cheap.
pub struct SessionInfoCache {
    entries: RwLock<HashMap<PathBuf, (SystemTime, SessionSummary)>>,
}

impl Default for SessionInfoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionInfoCache {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub fn get_session_info(&self, path: &Path) -> Result<SessionSummary, SessionFileError> {
        let mtime = fs::metadata(path)?.modified()?;

        if let Some((cached_mtime, summary)) = self.entries.read().unwrap().get(path) {
            if *cached_mtime == mtime {
                return Ok(summary.clone());
            }
        }

        let summary = stream_session_info(path)?;
        self.entries.write().unwrap().insert(path.to_path_buf(), (mtime, summary.clone()));
        Ok(summary)
    }
}

fn stream_session_info(path: &Path) -> Result<SessionSummary, SessionFileError> {
    let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or("").to_owned();
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut header: Option<Value> = None;
    let mut message_count = 0usize;
    let mut first_prompt = None;
    let mut last_message = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(v) = serde_json::from_str::<Value>(&line) else { continue };

        if i == 0 && v.get("type").and_then(Value::as_str) == Some("session") {
            header = Some(v);
            continue;
        }

        if v.get("type").and_then(Value::as_str) == Some("message") {
            message_count += 1;
            let role = v.get("role").and_then(Value::as_str).unwrap_or("");
            let text = first_nonempty_text(&v);
            if role == "user" && first_prompt.is_none() && !text.is_empty() {
                first_prompt = Some(text.clone());
            }
            if !text.is_empty() {
                last_message = Some(text);
            }
        }
    }

    let (id, cwd, timestamp, parent_session) = match &header {
        Some(v) => (
            v.get("id").and_then(Value::as_str).map(str::to_owned).unwrap_or_else(|| filename_id(&filename)),
            v.get("cwd").and_then(Value::as_str).map(str::to_owned),
            v.get("timestamp").and_then(Value::as_str).map(str::to_owned),
            v.get("parentSession").and_then(Value::as_str).map(str::to_owned),
        ),
        None => (filename_id(&filename), None, None, None),
    };

    Ok(SessionSummary {
        id,
        file: path.to_path_buf(),
        cwd,
        timestamp,
        parent_session,
        name: None,
        first_prompt,
        message_count,
        last_message,
    })
}

/// Returns the raw entry values on the path from the root to
/// `up_to_entry_id` inclusive, in file order — used by forking to copy a
/// source session's history verbatim up to the chosen fork point.
pub fn path_entries_up_to(path: &Path, up_to_entry_id: &str) -> Result<Vec<Value>, SessionFileError> {
    let (_, entries) = read_entries(path)?;
    let by_id: HashMap<&str, usize> =
        entries.iter().enumerate().filter_map(|(i, e)| e.id.as_deref().map(|id| (id, i))).collect();

    let target = entries
        .iter()
        .position(|e| e.id.as_deref() == Some(up_to_entry_id))
        .ok_or(SessionFileError::NotFound)?;

    let path_indices = walk_to_root(&entries, &by_id, target);
    Ok(path_indices.into_iter().map(|i| entries[i].raw.clone()).collect())
}

/// Scans `root` recursively for candidate session files, applies the `cwd`
/// filter via a cheap header read, sorts descending by filename timestamp,
/// and pages deterministically.
pub fn list_sessions(
    root: &Path,
    cache: &SessionInfoCache,
    query: &ListSessionsQuery,
) -> Result<ListSessionsResult, SessionFileError> {
    let mut files = walk_session_files(root);
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut summaries = Vec::new();
    for file in &files {
        let info = cache.get_session_info(file)?;
        if let Some(cwd) = &query.cwd {
            if info.cwd.as_deref() != Some(cwd.as_str()) {
                continue;
            }
        }
        summaries.push(info);
    }

    let total = summaries.len();
    let limit = if query.limit == 0 { total } else { query.limit };
    let page = summaries.into_iter().skip(query.offset).take(limit).collect();

    Ok(ListSessionsResult { total, sessions: page })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
