// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level application state tying every subsystem together.
//!
//! Organized into focused fields by concern, the way `transport/state.rs`'s
//! `Store` groups its own subsystems, but with one field per component
//! instead of nested sub-structs since each component here is already its
//! own self-contained `Arc<...>`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::http::stubs::{BrainStore, ConfigStore, JsonFileConfigStore, JsonFileTasksStore, JsonlBrainStore, TasksStore};
use crate::reliability::Reliability;
use crate::review::ReviewBus;
use crate::rpc::Manager;
use crate::session_file::SessionInfoCache;
use crate::ui_events::UiEvents;

/// Static settings read once at startup from the environment table.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sessions_root: PathBuf,
    pub repo_root: PathBuf,
    pub auth_token: Option<String>,
    pub debug_timing: bool,
}

pub struct AppState {
    pub config: AppConfig,
    pub session_cache: SessionInfoCache,
    pub manager: Arc<Manager>,
    pub reliability: Arc<Reliability>,
    pub review: Arc<ReviewBus>,
    pub ui_events: UiEvents,
    pub brain: Arc<dyn BrainStore>,
    pub tasks: Arc<dyn TasksStore>,
    pub config_store: Arc<dyn ConfigStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        manager: Arc<Manager>,
        reliability: Arc<Reliability>,
        review: Arc<ReviewBus>,
        ui_events: UiEvents,
        brain: Arc<dyn BrainStore>,
        tasks: Arc<dyn TasksStore>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            session_cache: SessionInfoCache::new(),
            manager,
            reliability,
            review,
            ui_events,
            brain,
            tasks,
            config_store,
        })
    }

    /// Convenience constructor wiring the default filesystem-backed stub
    /// stores rooted at the rho home directory, for production bootstrap.
    pub fn new_with_default_stubs(
        config: AppConfig,
        manager: Arc<Manager>,
        reliability: Arc<Reliability>,
        review: Arc<ReviewBus>,
        ui_events: UiEvents,
        home: &std::path::Path,
    ) -> std::io::Result<Arc<Self>> {
        let brain = Arc::new(JsonlBrainStore::new(home.join("brain.jsonl"))?);
        let tasks = Arc::new(JsonFileTasksStore::new(home.join("tasks.json"))?);
        let config_store = Arc::new(JsonFileConfigStore::new(home.join("config.json"))?);
        Ok(Self::new(config, manager, reliability, review, ui_events, brain, tasks, config_store))
    }
}
