// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-file HTTP handlers: listing, reading, forking, and creating.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ErrorCode;
use crate::session_file::{self, fork, ListSessionsQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsParams {
    pub cwd: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

/// `GET /api/sessions?cwd&offset&limit`
pub async fn list_sessions(State(state): State<Arc<AppState>>, Query(params): Query<ListSessionsParams>) -> impl IntoResponse {
    let query = ListSessionsQuery { cwd: params.cwd, offset: params.offset, limit: params.limit };
    match session_file::list_sessions(&state.config.sessions_root, &state.session_cache, &query) {
        Ok(result) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&result.total.to_string()) {
                headers.insert("X-Total-Count", value);
            }
            (headers, Json(result.sessions)).into_response()
        }
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/sessions/:id`
pub async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let Some(path) = session_file::find_session_file_by_id(&state.config.sessions_root, &id) else {
        return ErrorCode::UnknownSession.to_http_response("session not found").into_response();
    };
    match session_file::read_session(&path) {
        Ok(result) => Json(serde_json::json!({
            "header": result.header,
            "messages": result.messages,
            "forkPoints": result.fork_points,
            "stats": result.stats,
            "name": result.name,
            "file": path,
        }))
        .into_response(),
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ForkRequest {
    pub entry_id: Option<String>,
}

/// `POST /api/sessions/:id/fork {entryId?}`
pub async fn fork_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ForkRequest>,
) -> impl IntoResponse {
    let Some(source) = session_file::find_session_file_by_id(&state.config.sessions_root, &id) else {
        return ErrorCode::UnknownSession.to_http_response("session not found").into_response();
    };

    let new_id = uuid::Uuid::new_v4().to_string();
    let timestamp = filename_timestamp();

    match fork::fork_session(&state.config.sessions_root, &source, body.entry_id.as_deref(), &new_id, &timestamp) {
        Ok(outcome) => {
            state.ui_events.emit("sessions_changed", None);
            (StatusCode::OK, Json(serde_json::json!({"id": outcome.new_id, "file": outcome.path}))).into_response()
        }
        Err(fork::ForkError::NoForkPoint) | Err(fork::ForkError::UnknownEntryId) => {
            ErrorCode::BadRequest.to_http_response("entryId is not a valid fork point for this session").into_response()
        }
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct NewSessionRequest {
    pub cwd: String,
}

/// `POST /api/sessions/new`
pub async fn new_session(State(state): State<Arc<AppState>>, Json(body): Json<NewSessionRequest>) -> impl IntoResponse {
    let new_id = uuid::Uuid::new_v4().to_string();
    let timestamp = filename_timestamp();

    match fork::new_session_file(&state.config.sessions_root, &body.cwd, &new_id, &timestamp) {
        Ok(path) => {
            state.ui_events.emit("sessions_changed", None);
            (StatusCode::OK, Json(serde_json::json!({"id": new_id, "file": path}))).into_response()
        }
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// Renders the current instant as the `.`/`:`-replaced ISO-8601 filename
/// timestamp shape session logs use, e.g. `2025-02-04T12-30-45-123Z`.
fn filename_timestamp() -> String {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    let millis = now.as_millis() as i64;
    let secs = millis / 1000;
    let datetime = chrono_like_utc(secs);
    format!("{datetime}-{:03}Z", millis % 1000)
}

/// Minimal UTC calendar conversion (no date/time crate in this workspace).
fn chrono_like_utc(secs: i64) -> String {
    let days = secs.div_euclid(86_400);
    let secs_of_day = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    let hour = secs_of_day / 3600;
    let min = (secs_of_day % 3600) / 60;
    let sec = secs_of_day % 60;
    format!("{year:04}-{month:02}-{day:02}T{hour:02}-{min:02}-{sec:02}")
}

/// Howard Hinnant's `civil_from_days` algorithm: days-since-epoch to
/// (year, month, day), proleptic Gregorian, valid for the full i64 range.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
