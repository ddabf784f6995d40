// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the server crate.

use std::path::PathBuf;
use std::time::Duration;

/// HTTP listen port: `QUORUM_PORT`, default 8080.
pub fn port() -> u16 {
    std::env::var("QUORUM_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080)
}

/// Project root served by default: `QUORUM_PROJECT_ROOT`, default cwd.
pub fn project_root() -> PathBuf {
    std::env::var("QUORUM_PROJECT_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Global config path: `QUORUM_GLOBAL_CONFIG` > XDG config dir > ~/.config.
pub fn global_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("QUORUM_GLOBAL_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quorum")
        .join("config.yaml")
}

/// HTTP request budget (unrelated to execution): `QUORUM_HTTP_TIMEOUT_MS`, default 60 s.
pub fn http_timeout() -> Duration {
    std::env::var("QUORUM_HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(60))
}

/// Orphan sweep interval: `QUORUM_REAP_INTERVAL_MS`, default 60 s.
pub fn reap_interval() -> Duration {
    std::env::var("QUORUM_REAP_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(60))
}

/// Optional log directory for file logging: `QUORUM_LOG_DIR`.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var("QUORUM_LOG_DIR").ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
