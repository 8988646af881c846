// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/REST surface: session/git/review/brain/tasks/config routes, plus
//! the two WebSocket upgrades (`/ws` and `/review/{id}/ws`), assembled
//! into one router from three differently-typed sub-routers merged
//! together before the shared auth and CORS layers are applied.

pub mod git;
pub mod review_routes;
pub mod sessions;
pub mod stubs;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::auth;
use crate::error::ErrorResponse;
use crate::gateway::{self, GatewayState};
use crate::review;
use crate::state::AppState;

async fn auth_layer(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if path == "/ws" || path.ends_with("/ws") {
        return next.run(req).await;
    }
    if let Err(code) = auth::validate_bearer(req.headers(), state.config.auth_token.as_deref()) {
        let body = ErrorResponse { error: code.to_error_body("unauthorized") };
        return (axum::http::StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    }
    next.run(req).await
}

fn api_router(state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/{id}", get(sessions::get_session))
        .route("/api/sessions/{id}/fork", post(sessions::fork_session))
        .route("/api/sessions/new", post(sessions::new_session))
        .route("/api/git/status", get(git::status))
        .route("/api/git/diff", get(git::diff))
        .route("/api/review/from-git", post(git::review_from_git))
        .route("/api/review/submissions", get(review_routes::list_submissions))
        .route("/api/review/submissions/{id}", get(review_routes::get_submission))
        .route("/api/review/submissions/{id}/claim", post(review_routes::claim_submission))
        .route("/api/review/submissions/{id}/resolve", post(review_routes::resolve_submission))
        .route("/api/brain", get(stubs::list_brain_entries).post(stubs::append_brain_entry))
        .route("/api/tasks", get(stubs::list_tasks).post(stubs::create_task))
        .route("/api/tasks/{id}", patch(stubs::update_task).delete(stubs::delete_task))
        .route("/api/config", get(stubs::get_config).patch(stubs::patch_config))
        .with_state(state)
}

/// Assembles the full HTTP/WS surface over one shared [`AppState`].
pub fn build_router(state: Arc<AppState>) -> Router {
    let gateway_state = Arc::new(GatewayState {
        manager: Arc::clone(&state.manager),
        reliability: Arc::clone(&state.reliability),
        ui_events: state.ui_events.sender(),
        auth_token: state.config.auth_token.clone(),
    });
    let gateway_router = Router::new().route("/ws", get(gateway::ws_handler)).with_state(gateway_state);

    let review_router =
        Router::new().route("/review/{id}/ws", get(review::ws_handler)).with_state(Arc::clone(&state.review));

    let api = api_router(Arc::clone(&state));

    Router::new()
        .merge(gateway_router)
        .merge(review_router)
        .merge(api)
        .layer(middleware::from_fn_with_state(state, auth_layer))
        .layer(CorsLayer::permissive())
}
