// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level process bootstrap — shared by `main` and integration tests.
//!
//! Wires the reliability layer, the RPC session manager, the review bus,
//! the UI-event broadcaster, and the git-context file watch into one
//! [`AppState`], then serves the assembled router over TCP and/or a Unix
//! socket until shutdown is signalled.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::http;
use crate::reliability::{Reliability, ReliabilityConfig};
use crate::review::store::JsonlReviewStore;
use crate::review::{ReviewBus, ReviewBusConfig};
use crate::rpc::{Manager, ManagerConfig};
use crate::state::{AppConfig, AppState};
use crate::ui_events::{GitContextWatcher, UiEvents};

pub struct RunResult {
    pub state: Arc<AppState>,
    pub shutdown: CancellationToken,
}

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = if std::env::var("RUST_LOG").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let home = config.effective_rho_home();
    let repo_root = config.effective_repo_root()?;

    let reliability = Arc::new(Reliability::new(ReliabilityConfig {
        ring_capacity: config.event_buffer_size,
        command_ttl: std::time::Duration::from_millis(config.command_retention_ms),
        orphan_grace: std::time::Duration::from_millis(config.orphan_grace_ms),
        orphan_abort_delay: std::time::Duration::from_millis(config.orphan_abort_delay_ms),
    }));

    let manager = Manager::new(
        ManagerConfig {
            agent_command: config.agent_command.clone(),
            agent_args: config.agent_args.clone(),
            stop_grace: std::time::Duration::from_secs(5),
            broadcast_capacity: 256,
        },
        Arc::clone(&reliability),
    );

    let ui_events = UiEvents::new(config.event_buffer_size);

    let review_store = JsonlReviewStore::new(config.effective_review_store_dir().join("submissions.jsonl"))?;
    let review = ReviewBus::new(
        ReviewBusConfig {
            open_ttl: std::time::Duration::from_millis(config.review_open_ttl_ms),
            post_completion_ttl: std::time::Duration::from_millis(config.review_done_ttl_ms),
            max_file_bytes: config.review_max_file_bytes as usize,
        },
        Arc::new(review_store),
        ui_events.sender(),
    );

    let app_config = AppConfig {
        sessions_root: config.sessions_dir.clone(),
        repo_root,
        auth_token: config.auth_token.clone(),
        debug_timing: config.debug_timing,
    };

    AppState::new_with_default_stubs(app_config, manager, reliability, review, ui_events, &home)
        .map_err(anyhow::Error::from)
}

/// Prepare and run the gateway/review-bus server to completion.
///
/// This is the full production codepath: build application state, start
/// the git-context watcher, bind the configured transports, and serve
/// until a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<RunResult> {
    init_tracing(&config);
    config.validate()?;

    let shutdown = CancellationToken::new();
    let state = build_state(&config)?;

    let watcher = GitContextWatcher::new(config.effective_rho_home().join("git-context.json"));
    {
        let ui_events = state.ui_events.clone();
        let sd = shutdown.clone();
        tokio::spawn(watcher.run(ui_events, sd));
    }

    if let Some(port) = config.port {
        let router = http::build_router(Arc::clone(&state));
        let addr = format!("{}:{}", config.host, port);
        let listener = TcpListener::bind(&addr).await?;
        info!("HTTP listening on {}", listener.local_addr()?);
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, router).with_graceful_shutdown(sd.cancelled_owned()).await;
            if let Err(e) = result {
                error!("HTTP server error: {e}");
            }
        });
    }

    if let Some(ref socket_path) = config.socket {
        let router = http::build_router(Arc::clone(&state));
        let path = socket_path.clone();
        let _ = std::fs::remove_file(&path);
        let uds_listener = tokio::net::UnixListener::bind(&path)?;
        info!("Unix socket listening on {path}");
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut make_svc = router.into_make_service();
            loop {
                tokio::select! {
                    _ = sd.cancelled() => break,
                    accept = uds_listener.accept() => {
                        match accept {
                            Ok((stream, _)) => {
                                let svc_future = <_ as tower::Service<_>>::call(&mut make_svc, ());
                                tokio::spawn(async move {
                                    let Ok(svc) = svc_future.await;
                                    let io = hyper_util::rt::TokioIo::new(stream);
                                    let hyper_svc = hyper_util::service::TowerToHyperService::new(svc);
                                    let _ = hyper_util::server::conn::auto::Builder::new(
                                        hyper_util::rt::TokioExecutor::new(),
                                    )
                                    .serve_connection_with_upgrades(io, hyper_svc)
                                    .await;
                                });
                            }
                            Err(e) => {
                                tracing::debug!("unix socket accept error: {e}");
                            }
                        }
                    }
                }
            }
        });
    }

    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => info!("received SIGTERM"),
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => info!("received SIGINT"),
            }
            sd.cancel();
        });
    }

    shutdown.cancelled().await;
    Ok(RunResult { state, shutdown })
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
