// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::Config;

fn parse(args: &[&str]) -> Config {
    Config::parse_from(args)
}

#[test]
fn valid_config_with_port() -> anyhow::Result<()> {
    let config = parse(&["rho", "--port", "8080", "--sessions-dir", "/tmp/rho-sessions"]);
    config.validate()?;
    assert_eq!(config.port, Some(8080));
    Ok(())
}

#[test]
fn valid_config_with_socket() -> anyhow::Result<()> {
    let config = parse(&["rho", "--socket", "/tmp/rho.sock", "--sessions-dir", "/tmp/rho-sessions"]);
    config.validate()?;
    assert_eq!(config.socket.as_deref(), Some("/tmp/rho.sock"));
    Ok(())
}

#[test]
fn invalid_no_transport() {
    let config = parse(&["rho", "--sessions-dir", "/tmp/rho-sessions"]);
    let err = config.validate().unwrap_err();
    assert!(
        err.to_string().contains("--port or --socket"),
        "unexpected error: {err}"
    );
}

#[test]
fn invalid_relative_sessions_dir() {
    let config = parse(&["rho", "--port", "8080", "--sessions-dir", "relative/path"]);
    let err = config.validate().unwrap_err();
    assert!(
        err.to_string().contains("absolute"),
        "unexpected error: {err}"
    );
}

#[test]
fn defaults_are_correct() {
    let config = parse(&["rho", "--port", "8080", "--sessions-dir", "/tmp/rho-sessions"]);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.event_buffer_size, 800);
    assert_eq!(config.command_retention_ms, 300_000);
    assert_eq!(config.orphan_grace_ms, 60_000);
    assert_eq!(config.orphan_abort_delay_ms, 5_000);
    assert_eq!(config.review_open_ttl_ms, 86_400_000);
    assert_eq!(config.review_done_ttl_ms, 1_800_000);
    assert_eq!(config.review_max_file_bytes, 512_000);
    assert_eq!(config.log_format, "json");
    assert_eq!(config.log_level, "info");
    assert!(!config.debug_timing);
}

#[test]
fn effective_review_store_dir_defaults_under_sessions_dir() {
    let config = parse(&["rho", "--port", "8080", "--sessions-dir", "/tmp/rho-sessions"]);
    assert_eq!(
        config.effective_review_store_dir(),
        std::path::PathBuf::from("/tmp/rho-sessions/.rho-reviews")
    );
}

#[test]
fn effective_review_store_dir_honors_override() {
    let config = parse(&[
        "rho",
        "--port",
        "8080",
        "--sessions-dir",
        "/tmp/rho-sessions",
        "--review-store-dir",
        "/tmp/other-reviews",
    ]);
    assert_eq!(
        config.effective_review_store_dir(),
        std::path::PathBuf::from("/tmp/other-reviews")
    );
}

#[test]
fn effective_rho_home_defaults_to_sessions_dir_parent() {
    let config = parse(&["rho", "--port", "8080", "--sessions-dir", "/tmp/rho-sessions/logs"]);
    assert_eq!(config.effective_rho_home(), std::path::PathBuf::from("/tmp/rho-sessions"));
}

#[test]
fn effective_rho_home_honors_override() {
    let config =
        parse(&["rho", "--port", "8080", "--sessions-dir", "/tmp/rho-sessions", "--rho-home", "/tmp/rho-home"]);
    assert_eq!(config.effective_rho_home(), std::path::PathBuf::from("/tmp/rho-home"));
}

#[test]
fn effective_repo_root_honors_override() {
    let config =
        parse(&["rho", "--port", "8080", "--sessions-dir", "/tmp/rho-sessions", "--repo-root", "/tmp/repo"]);
    assert_eq!(config.effective_repo_root().unwrap(), std::path::PathBuf::from("/tmp/repo"));
}
