// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin CRUD stubs for the `brain`, `tasks`, and `config` surfaces. The
//! core never interprets these payloads beyond the tombstone-aware fold
//! the brain log needs; everything else is opaque JSON passed straight
//! through to a collaborator trait, so tests can substitute an in-memory
//! fake without touching the filesystem.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ErrorCode;
use crate::review::store::{StoreError, StoreErrorKind};
use crate::state::AppState;

fn store_error_response(e: StoreError) -> axum::response::Response {
    ErrorCode::from_store_kind(e.kind.as_str()).to_http_response(e.message).into_response()
}

/// Opaque, append-only tagged log. The only structure the core imposes is
/// the tombstone fold: an entry tagged `tombstone` with a `targetId` field
/// removes the entry with that id from `list`.
pub trait BrainStore: Send + Sync {
    fn append_entry(&self, entry: Value) -> Result<Value, StoreError>;
    fn list_entries(&self, tag: Option<&str>) -> Result<Vec<Value>, StoreError>;
}

/// Opaque CRUD collection, identified by an `id` field the store assigns
/// on create.
pub trait TasksStore: Send + Sync {
    fn list_tasks(&self) -> Result<Vec<Value>, StoreError>;
    fn create_task(&self, task: Value) -> Result<Value, StoreError>;
    fn update_task(&self, id: &str, patch: Value) -> Result<Value, StoreError>;
    fn delete_task(&self, id: &str) -> Result<(), StoreError>;
}

/// A single opaque JSON document, read and shallow-merge-patched.
pub trait ConfigStore: Send + Sync {
    fn get_config(&self) -> Result<Value, StoreError>;
    fn patch_config(&self, patch: Value) -> Result<Value, StoreError>;
}

/// Append-only JSONL log, same read-all/append shape as
/// `review::store::JsonlReviewStore`.
pub struct JsonlBrainStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlBrainStore {
    pub fn new(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path, write_lock: Mutex::new(()) })
    }

    fn read_all(&self) -> Vec<Value> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else { return Vec::new() };
        contents.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
    }
}

impl BrainStore for JsonlBrainStore {
    fn append_entry(&self, entry: Value) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut line =
            serde_json::to_string(&entry).map_err(|e| StoreError::new(StoreErrorKind::InvalidInput, e.to_string()))?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))?;
        file.write_all(line.as_bytes()).map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))?;
        Ok(entry)
    }

    fn list_entries(&self, tag: Option<&str>) -> Result<Vec<Value>, StoreError> {
        let mut live: HashMap<String, Value> = HashMap::new();
        for entry in self.read_all() {
            let id = entry.get("id").and_then(Value::as_str).unwrap_or_default().to_owned();
            if entry.get("tag").and_then(Value::as_str) == Some("tombstone") {
                if let Some(target) = entry.get("targetId").and_then(Value::as_str) {
                    live.remove(target);
                }
                continue;
            }
            live.insert(id, entry);
        }
        let mut entries: Vec<Value> = live
            .into_values()
            .filter(|e| tag.map(|t| e.get("tag").and_then(Value::as_str) == Some(t)).unwrap_or(true))
            .collect();
        entries.sort_by_key(|e| e.get("id").and_then(Value::as_str).unwrap_or_default().to_owned());
        Ok(entries)
    }
}

/// Whole-file JSON array, rewritten on every mutation. Matches the
/// teacher's file-is-the-record-set style for small, rarely-written state
/// rather than the append-only shape the brain log and review store use.
pub struct JsonFileTasksStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileTasksStore {
    pub fn new(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path, write_lock: Mutex::new(()) })
    }

    fn read_all(&self) -> Vec<Value> {
        std::fs::read_to_string(&self.path).ok().and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default()
    }

    fn write_all(&self, tasks: &[Value]) -> Result<(), StoreError> {
        let text =
            serde_json::to_string_pretty(tasks).map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))
    }
}

impl TasksStore for JsonFileTasksStore {
    fn list_tasks(&self) -> Result<Vec<Value>, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        Ok(self.read_all())
    }

    fn create_task(&self, mut task: Value) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut tasks = self.read_all();
        let id = uuid::Uuid::new_v4().to_string();
        if let Value::Object(map) = &mut task {
            map.insert("id".into(), Value::String(id));
        }
        tasks.push(task.clone());
        self.write_all(&tasks)?;
        Ok(task)
    }

    fn update_task(&self, id: &str, patch: Value) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut tasks = self.read_all();
        let Some(existing) = tasks.iter_mut().find(|t| t.get("id").and_then(Value::as_str) == Some(id)) else {
            return Err(StoreError::new(StoreErrorKind::NotFound, id));
        };
        if let (Value::Object(existing_map), Value::Object(patch_map)) = (&mut *existing, patch) {
            for (k, v) in patch_map {
                existing_map.insert(k, v);
            }
        }
        let updated = existing.clone();
        self.write_all(&tasks)?;
        Ok(updated)
    }

    fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut tasks = self.read_all();
        let before = tasks.len();
        tasks.retain(|t| t.get("id").and_then(Value::as_str) != Some(id));
        if tasks.len() == before {
            return Err(StoreError::new(StoreErrorKind::NotFound, id));
        }
        self.write_all(&tasks)?;
        Ok(())
    }
}

/// A single opaque JSON document on disk, shallow-merge-patched.
pub struct JsonFileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileConfigStore {
    pub fn new(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path, write_lock: Mutex::new(()) })
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get_config(&self) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        Ok(std::fs::read_to_string(&self.path).ok().and_then(|s| serde_json::from_str(&s).ok()).unwrap_or(Value::Object(Default::default())))
    }

    fn patch_config(&self, patch: Value) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut current: Value =
            std::fs::read_to_string(&self.path).ok().and_then(|s| serde_json::from_str(&s).ok()).unwrap_or(Value::Object(Default::default()));
        if let (Value::Object(current_map), Value::Object(patch_map)) = (&mut current, patch) {
            for (k, v) in patch_map {
                current_map.insert(k, v);
            }
        }
        let text =
            serde_json::to_string_pretty(&current).map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| StoreError::new(StoreErrorKind::Other, e.to_string()))?;
        Ok(current)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListBrainParams {
    pub tag: Option<String>,
}

/// `GET /api/brain?tag=`
pub async fn list_brain_entries(State(state): State<Arc<AppState>>, Query(params): Query<ListBrainParams>) -> impl IntoResponse {
    match state.brain.list_entries(params.tag.as_deref()) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `POST /api/brain`
pub async fn append_brain_entry(State(state): State<Arc<AppState>>, Json(entry): Json<Value>) -> impl IntoResponse {
    match state.brain.append_entry(entry) {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `GET /api/tasks`
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.tasks.list_tasks() {
        Ok(tasks) => Json(tasks).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `POST /api/tasks`
pub async fn create_task(State(state): State<Arc<AppState>>, Json(task): Json<Value>) -> impl IntoResponse {
    match state.tasks.create_task(task) {
        Ok(task) => Json(task).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `PATCH /api/tasks/:id`
pub async fn update_task(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(patch): Json<Value>) -> impl IntoResponse {
    match state.tasks.update_task(&id, patch) {
        Ok(task) => Json(task).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `DELETE /api/tasks/:id`
pub async fn delete_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.tasks.delete_task(&id) {
        Ok(()) => axum::http::StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `GET /api/config`
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.config_store.get_config() {
        Ok(value) => Json(value).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `PATCH /api/config`
pub async fn patch_config(State(state): State<Arc<AppState>>, Json(patch): Json<Value>) -> impl IntoResponse {
    match state.config_store.patch_config(patch) {
        Ok(value) => Json(value).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[cfg(test)]
#[path = "stubs_tests.rs"]
mod tests;
