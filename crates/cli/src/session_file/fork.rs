// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-copy forking: a new session file whose header carries
//! `parentSession` and whose entries are the source's path up to and
//! including the chosen fork point, copied verbatim.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::{path_entries_up_to, read_session, SessionFileError};

#[derive(Debug)]
pub enum ForkError {
    NoForkPoint,
    UnknownEntryId,
    Source(SessionFileError),
    Io(std::io::Error),
}

impl std::fmt::Display for ForkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoForkPoint => write!(f, "source session has no fork points"),
            Self::UnknownEntryId => write!(f, "entryId is not a valid fork point for this session"),
            Self::Source(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for ForkError {}

impl From<std::io::Error> for ForkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<SessionFileError> for ForkError {
    fn from(e: SessionFileError) -> Self {
        Self::Source(e)
    }
}

pub struct ForkOutcome {
    pub path: PathBuf,
    pub new_id: String,
}

/// Creates a new session file forked from `source` at `entry_id` (or the
/// source's last fork point when `entry_id` is `None`). `new_id` and
/// `timestamp_for_filename` are supplied by the caller so this module
/// never reads the clock or generates ids itself.
pub fn fork_session(
    root: &Path,
    source: &Path,
    entry_id: Option<&str>,
    new_id: &str,
    timestamp_for_filename: &str,
) -> Result<ForkOutcome, ForkError> {
    let parsed = read_session(source)?;

    let target_entry_id = match entry_id {
        Some(id) => {
            if !parsed.fork_points.iter().any(|fp| fp.entry_id == id) {
                return Err(ForkError::UnknownEntryId);
            }
            id.to_owned()
        }
        None => parsed.fork_points.last().ok_or(ForkError::NoForkPoint)?.entry_id.clone(),
    };

    let entries = path_entries_up_to(source, &target_entry_id)?;

    let cwd = parsed.header.cwd.clone().unwrap_or_default();
    let slashified_cwd = slashify(&cwd);
    let dest_dir = root.join(slashified_cwd);
    fs::create_dir_all(&dest_dir)?;

    let filename = format!("{timestamp_for_filename}_{new_id}.jsonl");
    let dest_path = dest_dir.join(filename);

    let header = json!({
        "type": "session",
        "id": new_id,
        "version": parsed.header.version.unwrap_or(1),
        "timestamp": timestamp_for_filename,
        "cwd": cwd,
        "parentSession": parsed.header.id,
    });

    write_jsonl(&dest_path, &header, &entries)?;

    Ok(ForkOutcome { path: dest_path, new_id: new_id.to_owned() })
}

/// Writes a fresh, header-only session file for `POST /api/sessions/new`.
pub fn new_session_file(
    root: &Path,
    cwd: &str,
    new_id: &str,
    timestamp_for_filename: &str,
) -> Result<PathBuf, std::io::Error> {
    let dest_dir = root.join(slashify(cwd));
    fs::create_dir_all(&dest_dir)?;
    let filename = format!("{timestamp_for_filename}_{new_id}.jsonl");
    let dest_path = dest_dir.join(filename);

    let header = json!({
        "type": "session",
        "id": new_id,
        "version": 1,
        "timestamp": timestamp_for_filename,
        "cwd": cwd,
    });

    write_jsonl(&dest_path, &header, &[])?;
    Ok(dest_path)
}

fn write_jsonl(path: &Path, header: &Value, entries: &[Value]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "{}", serde_json::to_string(header)?)?;
    for entry in entries {
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
    }
    Ok(())
}

/// Turns an absolute cwd path into the directory-safe shape used under
/// `<home>/.pi/agent/sessions/<slashified-cwd>/`.
fn slashify(cwd: &str) -> String {
    cwd.trim_start_matches('/').replace('/', "-")
}

#[cfg(test)]
#[path = "fork_tests.rs"]
mod tests;
