// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git status/diff and review-from-git HTTP handlers. Shells out to the
//! `git` binary the way `workspace_fs.rs` drives worktree setup: a plain
//! `tokio::process::Command` with explicit args, no PTY involved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ErrorCode;
use crate::state::AppState;

/// Rejects paths that are absolute, escape the repo via `..`, or contain a
/// NUL byte, per the guard both git endpoints share.
fn guard_repo_relative_path(path: &str) -> Result<(), &'static str> {
    if path.contains('\0') {
        return Err("path contains a NUL byte");
    }
    if Path::new(path).is_absolute() {
        return Err("path must be repo-relative");
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err("path escapes the repository");
    }
    Ok(())
}

async fn run_git(repo_root: &Path, args: &[&str]) -> std::io::Result<std::process::Output> {
    tokio::process::Command::new("git").arg("-C").arg(repo_root).args(args).output().await
}

/// `GET /api/git/status`
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match run_git(&state.config.repo_root, &["status", "--porcelain=v1"]).await {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            let entries: Vec<_> = text
                .lines()
                .filter(|l| !l.is_empty())
                .map(|l| {
                    let (code, path) = l.split_at(2.min(l.len()));
                    serde_json::json!({"status": code.trim(), "path": path.trim()})
                })
                .collect();
            Json(serde_json::json!({"entries": entries})).into_response()
        }
        Ok(output) => {
            ErrorCode::Internal.to_http_response(String::from_utf8_lossy(&output.stderr).into_owned()).into_response()
        }
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub file: String,
}

/// `GET /api/git/diff?file=…` — falls back unstaged → staged → synthetic
/// full-add diff for untracked files.
pub async fn diff(State(state): State<Arc<AppState>>, Query(query): Query<DiffQuery>) -> impl IntoResponse {
    if let Err(msg) = guard_repo_relative_path(&query.file) {
        return ErrorCode::BadRequest.to_http_response(msg).into_response();
    }

    match diff_for_file(&state.config.repo_root, &query.file).await {
        Ok(text) => Json(serde_json::json!({"file": query.file, "diff": text})).into_response(),
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

async fn diff_for_file(repo_root: &Path, file: &str) -> std::io::Result<String> {
    let unstaged = run_git(repo_root, &["diff", "--", file]).await?;
    if !unstaged.stdout.is_empty() {
        return Ok(String::from_utf8_lossy(&unstaged.stdout).into_owned());
    }

    let staged = run_git(repo_root, &["diff", "--cached", "--", file]).await?;
    if !staged.stdout.is_empty() {
        return Ok(String::from_utf8_lossy(&staged.stdout).into_owned());
    }

    // Untracked: synthesize a full-add diff via `git diff --no-index`.
    let full_add = run_git(repo_root, &["diff", "--no-index", "--", "/dev/null", file]).await?;
    Ok(String::from_utf8_lossy(&full_add.stdout).into_owned())
}

#[derive(Debug, Deserialize)]
pub struct ReviewFromGitRequest {
    pub files: Vec<String>,
    pub message: Option<String>,
}

/// `POST /api/review/from-git {files[], message?}`
pub async fn review_from_git(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReviewFromGitRequest>,
) -> impl IntoResponse {
    let mut candidates = Vec::new();
    for file in &body.files {
        if let Err(msg) = guard_repo_relative_path(file) {
            return ErrorCode::BadRequest.to_http_response(format!("{file}: {msg}")).into_response();
        }
        let path: PathBuf = state.config.repo_root.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => candidates.push((file.clone(), bytes)),
            Err(_) => continue,
        }
    }

    if candidates.is_empty() {
        return ErrorCode::FilesystemGuard.to_http_response("no readable files to review").into_response();
    }

    let id = uuid::Uuid::new_v4().to_string();
    match state.review.create_review(id, candidates, body.message.clone()) {
        Ok(created) => {
            state.ui_events.emit("review_sessions_changed", None);
            let url = format!("/review/{}/ws", created.id);
            Json(serde_json::json!({
                "id": created.id,
                "token": created.token,
                "warnings": created.warnings,
                "url": url,
            }))
            .into_response()
        }
        Err(crate::review::CreateReviewError::NoUsableFiles) => {
            ErrorCode::FilesystemGuard.to_http_response("all candidate files were rejected").into_response()
        }
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
