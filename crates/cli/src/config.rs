// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// RPC gateway and review bus server for the rho agent-ops workstation.
#[derive(Debug, Parser)]
#[command(name = "rho", version, about)]
pub struct Config {
    /// HTTP port to listen on.
    #[arg(long, env = "RHO_PORT")]
    pub port: Option<u16>,

    /// Unix socket path for HTTP.
    #[arg(long, env = "RHO_SOCKET")]
    pub socket: Option<String>,

    /// Host address to bind to.
    #[arg(long, env = "RHO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bearer token for API authentication. When unset, auth is disabled.
    #[arg(long, env = "RHO_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Root directory scanned for session files.
    #[arg(long, env = "RHO_SESSIONS_DIR")]
    pub sessions_dir: PathBuf,

    /// Directory where review bus submissions are persisted (JSONL).
    #[arg(long, env = "RHO_REVIEW_STORE_DIR")]
    pub review_store_dir: Option<PathBuf>,

    /// Directory holding `git-context.json`, the brain log, tasks, and
    /// config stub files. Defaults to the sessions directory's parent.
    #[arg(long, env = "RHO_HOME")]
    pub rho_home: Option<PathBuf>,

    /// Repository root the git status/diff/review-from-git endpoints
    /// operate against. Defaults to the current working directory.
    #[arg(long, env = "RHO_REPO_ROOT")]
    pub repo_root: Option<PathBuf>,

    /// Command used to spawn the RPC-speaking agent child process.
    #[arg(long, env = "RHO_AGENT_COMMAND", default_value = "pi")]
    pub agent_command: String,

    /// Extra args passed to the agent command before the session file path.
    #[arg(long, env = "RHO_AGENT_ARGS", value_delimiter = ' ')]
    pub agent_args: Vec<String>,

    /// Per-session event ring buffer size.
    #[arg(long, env = "RHO_EVENT_BUFFER_SIZE", default_value = "800")]
    pub event_buffer_size: usize,

    /// Command dedupe cache TTL in milliseconds.
    #[arg(long, env = "RHO_COMMAND_RETENTION_MS", default_value = "300000")]
    pub command_retention_ms: u64,

    /// Grace period before an orphaned session is aborted, in milliseconds.
    #[arg(long, env = "RHO_ORPHAN_GRACE_MS", default_value = "60000")]
    pub orphan_grace_ms: u64,

    /// Delay between abort and stop for an orphaned session, in milliseconds.
    #[arg(long, env = "RHO_ORPHAN_ABORT_DELAY_MS", default_value = "5000")]
    pub orphan_abort_delay_ms: u64,

    /// Review session open TTL (auto-cancel threshold), in milliseconds.
    #[arg(long, env = "RHO_REVIEW_OPEN_TTL_MS", default_value = "86400000")]
    pub review_open_ttl_ms: u64,

    /// Review session post-completion eviction delay, in milliseconds.
    #[arg(long, env = "RHO_REVIEW_DONE_TTL_MS", default_value = "1800000")]
    pub review_done_ttl_ms: u64,

    /// Maximum size in bytes of a single review file snapshot.
    #[arg(long, env = "RHO_REVIEW_MAX_FILE_BYTES", default_value = "512000")]
    pub review_max_file_bytes: u64,

    /// Log per-request timings at debug level.
    #[arg(long, env = "RHO_DEBUG_TIMING")]
    pub debug_timing: bool,

    /// Log format (json or text).
    #[arg(long, env = "RHO_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "RHO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port.is_none() && self.socket.is_none() {
            anyhow::bail!("either --port or --socket must be specified");
        }
        if !self.sessions_dir.is_absolute() {
            anyhow::bail!("--sessions-dir must be an absolute path");
        }
        Ok(())
    }

    /// Directory the review bus's default JSONL store persists to.
    pub fn effective_review_store_dir(&self) -> PathBuf {
        self.review_store_dir
            .clone()
            .unwrap_or_else(|| self.sessions_dir.join(".rho-reviews"))
    }

    /// Directory holding `git-context.json`, the brain log, tasks, and
    /// config stub files.
    pub fn effective_rho_home(&self) -> PathBuf {
        self.rho_home.clone().unwrap_or_else(|| {
            self.sessions_dir.parent().map(PathBuf::from).unwrap_or_else(|| self.sessions_dir.clone())
        })
    }

    /// Repository root the git endpoints operate against.
    pub fn effective_repo_root(&self) -> anyhow::Result<PathBuf> {
        match self.repo_root {
            Some(ref path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
