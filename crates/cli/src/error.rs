// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// The error taxonomy shared by the HTTP and WebSocket adapters.
///
/// Component-internal code never builds response bodies or WS frames
/// directly — it returns an `ErrorCode` (or a `Result<_, ErrorCode>`) and
/// lets the adapter at the edge decide how to surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Transport,
    UnknownSession,
    Duplicate,
    Gap,
    ChildDied,
    StoreNotFound,
    StoreConflict,
    StoreInvalid,
    FilesystemGuard,
    BadRequest,
    Unauthorized,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Transport => 400,
            Self::UnknownSession => 404,
            Self::Duplicate => 200,
            Self::Gap => 200,
            Self::ChildDied => 410,
            Self::StoreNotFound => 404,
            Self::StoreConflict => 409,
            Self::StoreInvalid => 400,
            Self::FilesystemGuard => 400,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT",
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::Duplicate => "DUPLICATE",
            Self::Gap => "GAP",
            Self::ChildDied => "CHILD_DIED",
            Self::StoreNotFound => "NOT_FOUND",
            Self::StoreConflict => "CONFLICT",
            Self::StoreInvalid => "INVALID_STATE",
            Self::FilesystemGuard => "FILESYSTEM_GUARD",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Map a [`crate::review::store::StoreErrorKind`] string onto the code
    /// the HTTP adapter maps to a status, per the review store interface.
    pub fn from_store_kind(kind: &str) -> Self {
        match kind {
            "NOT_FOUND" => Self::StoreNotFound,
            "CONFLICT" => Self::StoreConflict,
            "INVALID_STATE" | "INVALID_INPUT" => Self::StoreInvalid,
            _ => Self::Internal,
        }
    }

    /// Convert this error code into an [`ErrorBody`].
    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    /// Convert this error code into an axum JSON error response.
    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

/// Top-level error response envelope shared across HTTP and WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body containing a machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
