// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin passthroughs to the review bus's durable store for the
//! submission-list/claim/resolve surface. The bus's own `/review/{id}/ws`
//! handler owns the live socket protocol; these routes only ever touch
//! terminal, already-persisted records.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ErrorCode;
use crate::review::store::{ListReviewRecordsQuery, ReviewStatus, StoreError};
use crate::state::AppState;

fn store_error_response(e: StoreError) -> axum::response::Response {
    ErrorCode::from_store_kind(e.kind.as_str()).to_http_response(e.message).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsParams {
    pub status: Option<String>,
    #[serde(rename = "claimedBy")]
    pub claimed_by: Option<String>,
    pub limit: Option<usize>,
}

fn parse_status(raw: &str) -> Option<ReviewStatus> {
    match raw {
        "open" => Some(ReviewStatus::Open),
        "submitted" => Some(ReviewStatus::Submitted),
        "cancelled" => Some(ReviewStatus::Cancelled),
        _ => None,
    }
}

/// `GET /api/review/submissions?status&claimedBy&limit`
pub async fn list_submissions(State(state): State<Arc<AppState>>, Query(params): Query<ListSubmissionsParams>) -> impl IntoResponse {
    let query = ListReviewRecordsQuery {
        status: params.status.as_deref().and_then(parse_status),
        claimed_by: params.claimed_by,
        limit: params.limit,
    };
    match state.review.store().list_review_records(query) {
        Ok(records) => Json(records).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// `GET /api/review/submissions/:id`
pub async fn get_submission(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.review.store().get_review_record(&id) {
        Ok(record) => Json(record).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub by: String,
}

/// `POST /api/review/submissions/:id/claim {by}`
pub async fn claim_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ClaimRequest>,
) -> impl IntoResponse {
    match state.review.store().claim_review_record(&id, &body.by) {
        Ok(record) => Json(record).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub by: Option<String>,
}

/// `POST /api/review/submissions/:id/resolve {by?}`
pub async fn resolve_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ResolveRequest>,
) -> impl IntoResponse {
    match state.review.store().resolve_review_record(&id, body.by.as_deref()) {
        Ok(record) => {
            state.ui_events.emit("review_submissions_changed", None);
            Json(record).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

#[cfg(test)]
#[path = "review_routes_tests.rs"]
mod tests;
