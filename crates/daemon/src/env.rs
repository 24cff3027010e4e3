// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use fleet_engine::EngineConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Protocol version (from Cargo.toml).
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: FLEET_STATE_DIR > XDG_STATE_HOME/fleet >
/// ~/.local/state/fleet.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("FLEET_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("fleet"));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".local/state/fleet"))
}

/// Default IPC timeout.
pub fn ipc_timeout() -> Duration {
    ms_var("FLEET_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timer check interval override.
pub fn timer_check() -> Duration {
    ms_var("FLEET_TIMER_CHECK_MS").unwrap_or(Duration::from_secs(1))
}

/// Engine tunables from the environment, defaults per the data sheet.
pub fn engine_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Ok(base) = std::env::var("FLEET_API_BASE") {
        if !base.is_empty() {
            config.api_base = base;
        }
    }
    if let Some(n) = num_var("FLEET_MAX_CONCURRENT") {
        config.max_concurrent = n as usize;
    }
    if let Some(d) = ms_var("FLEET_AUTO_CLEANUP_DELAY_MS") {
        config.auto_cleanup_delay = d;
    }
    if let Some(d) = ms_var("FLEET_STALE_WORKER_THRESHOLD_MS") {
        config.stale_worker_threshold = d;
    }
    if let Some(d) = ms_var("FLEET_CAPTURE_TICK_MS") {
        config.capture_tick = d;
    }
    if let Some(d) = ms_var("FLEET_HEALTH_TICK_MS") {
        config.health_tick = d;
    }
    if let Some(d) = ms_var("FLEET_SENTINEL_INTERVAL_MS") {
        config.sentinel_interval = d;
    }
    if let Some(n) = num_var("FLEET_DEFAULT_COLS") {
        config.cols = n as u16;
    }
    if let Some(n) = num_var("FLEET_DEFAULT_ROWS") {
        config.rows = n as u16;
    }
    if let Ok(prefix) = std::env::var("FLEET_SESSION_PREFIX") {
        if !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            config.session_prefix = prefix;
        }
    }
    if let Ok(root) = std::env::var("FLEET_PROJECT_ROOT") {
        if !root.is_empty() {
            config.project_root = Some(PathBuf::from(root));
        }
    }
    if let Some(n) = num_var("FLEET_OUTPUT_RETENTION_DAYS") {
        config.output_retention_days = n;
    }
    config
}

/// Backend command override.
pub fn backend_command() -> String {
    std::env::var("FLEET_BACKEND_COMMAND").unwrap_or_else(|_| "claude".to_string())
}

/// Optional summarizer endpoint; must resolve to loopback. Non-loopback
/// values are refused (returns `None` after logging).
pub fn summarizer_url() -> Option<String> {
    let url = std::env::var("FLEET_OLLAMA_URL").ok().filter(|u| !u.is_empty())?;
    let host = url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split(['/', ':'])
        .next()
        .unwrap_or("");
    if matches!(host, "127.0.0.1" | "localhost" | "::1" | "[::1]") {
        Some(url)
    } else {
        tracing::warn!(url = %url, "ignoring non-loopback summarizer URL");
        None
    }
}

fn ms_var(name: &str) -> Option<Duration> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

fn num_var(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
