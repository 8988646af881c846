// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! The durable review store interface and a default, crate-local
//! JSONL-backed implementation so the repo runs standalone. Deployments
//! are free to swap in an external store by implementing [`ReviewStore`].

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    InvalidInput,
    Other,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::InvalidState => "INVALID_STATE",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Other => "OTHER",
        }
    }
}

#[derive(Debug)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewComment {
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub selected_text: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecordMeta {
    pub id: String,
    pub files: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Open,
    Submitted,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReviewRecord {
    pub meta: ReviewRecordMeta,
    pub status: ReviewStatus,
    #[serde(default)]
    pub comments: Vec<ReviewComment>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListReviewRecordsQuery {
    pub status: Option<ReviewStatus>,
    pub claimed_by: Option<String>,
    pub limit: Option<usize>,
}

/// The durable collaborator the core calls on every review terminal
/// transition. Implementations need not be async: writes are small and
/// local, matching every other append-only log in this crate.
pub trait ReviewStore: Send + Sync {
    fn create_review_record(&self, meta: ReviewRecordMeta) -> Result<StoredReviewRecord, StoreError>;
    fn submit_review_record(&self, id: &str, comments: Vec<ReviewComment>) -> Result<StoredReviewRecord, StoreError>;
    fn cancel_review_record(&self, id: &str) -> Result<StoredReviewRecord, StoreError>;
    fn claim_review_record(&self, id: &str, by: &str) -> Result<StoredReviewRecord, StoreError>;
    fn resolve_review_record(&self, id: &str, by: Option<&str>) -> Result<StoredReviewRecord, StoreError>;
    fn get_review_record(&self, id: &str) -> Result<StoredReviewRecord, StoreError>;
    fn list_review_records(&self, query: ListReviewRecordsQuery) -> Result<Vec<StoredReviewRecord>, StoreError>;
}

/// Append-only JSONL log of full record snapshots, one per mutation.
/// Reconstructs current state the way `event_log.rs` reconstructs catchup
/// state: read the whole file, keep the last line seen per id.
pub struct JsonlReviewStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlReviewStore {
    pub fn new(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path, write_lock: Mutex::new(()) })
    }

    fn read_all(&self) -> HashMap<String, StoredReviewRecord> {
        let mut records = HashMap::new();
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return records;
        };
        for line in contents.lines() {
            if let Ok(record) = serde_json::from_str::<StoredReviewRecord>(line) {
                records.insert(record.meta.id.clone(), record);
            }
        }
        records
    }

    fn append(&self, record: &StoredReviewRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))?;
        file.write_all(line.as_bytes()).map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))
    }
}

impl ReviewStore for JsonlReviewStore {
    fn create_review_record(&self, meta: ReviewRecordMeta) -> Result<StoredReviewRecord, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        if self.read_all().contains_key(&meta.id) {
            return Err(StoreError::new(StoreErrorKind::Conflict, "review record already exists"));
        }
        let record = StoredReviewRecord {
            meta,
            status: ReviewStatus::Open,
            comments: Vec::new(),
            claimed_by: None,
            resolved: false,
        };
        self.append(&record)?;
        Ok(record)
    }

    fn submit_review_record(&self, id: &str, comments: Vec<ReviewComment>) -> Result<StoredReviewRecord, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut records = self.read_all();
        let record = records.get_mut(id).ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, id))?;
        if record.status != ReviewStatus::Open {
            return Err(StoreError::new(StoreErrorKind::InvalidState, "review record is not open"));
        }
        record.status = ReviewStatus::Submitted;
        record.comments = comments;
        self.append(record)?;
        Ok(record.clone())
    }

    fn cancel_review_record(&self, id: &str) -> Result<StoredReviewRecord, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut records = self.read_all();
        let record = records.get_mut(id).ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, id))?;
        if record.status != ReviewStatus::Open {
            return Err(StoreError::new(StoreErrorKind::InvalidState, "review record is not open"));
        }
        record.status = ReviewStatus::Cancelled;
        self.append(record)?;
        Ok(record.clone())
    }

    fn claim_review_record(&self, id: &str, by: &str) -> Result<StoredReviewRecord, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut records = self.read_all();
        let record = records.get_mut(id).ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, id))?;
        if record.claimed_by.is_some() {
            return Err(StoreError::new(StoreErrorKind::Conflict, "review record already claimed"));
        }
        record.claimed_by = Some(by.to_owned());
        self.append(record)?;
        Ok(record.clone())
    }

    fn resolve_review_record(&self, id: &str, by: Option<&str>) -> Result<StoredReviewRecord, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut records = self.read_all();
        let record = records.get_mut(id).ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, id))?;
        if record.resolved {
            return Err(StoreError::new(StoreErrorKind::Conflict, "review record already resolved"));
        }
        record.resolved = true;
        if let Some(by) = by {
            record.claimed_by = Some(by.to_owned());
        }
        self.append(record)?;
        Ok(record.clone())
    }

    fn get_review_record(&self, id: &str) -> Result<StoredReviewRecord, StoreError> {
        self.read_all().remove(id).ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, id))
    }

    fn list_review_records(&self, query: ListReviewRecordsQuery) -> Result<Vec<StoredReviewRecord>, StoreError> {
        let mut records: Vec<StoredReviewRecord> = self
            .read_all()
            .into_values()
            .filter(|r| query.status.map(|s| s == r.status).unwrap_or(true))
            .filter(|r| query.claimed_by.is_none() || r.claimed_by == query.claimed_by)
            .collect();
        records.sort_by_key(|r| r.meta.created_at_ms);
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
