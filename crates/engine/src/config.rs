// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tunables.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the control API, injected into context files.
    pub api_base: String,
    /// Hard cap on concurrently running workers.
    pub max_concurrent: usize,
    /// Delay before a completed worker is killed.
    pub auto_cleanup_delay: Duration,
    /// Running workers inactive longer than this are logged by cleanup.
    pub stale_worker_threshold: Duration,
    /// No output for this long classifies a worker as stalled.
    pub stall_threshold: Duration,
    /// Capture loop tick.
    pub capture_tick: Duration,
    /// Startup window during which a missing session is not an error.
    pub capture_grace: Duration,
    /// Health monitor tick.
    pub health_tick: Duration,
    /// Sentinel tick.
    pub sentinel_interval: Duration,
    /// Default session geometry.
    pub cols: u16,
    pub rows: u16,
    /// Session-name prefix, fixed per deployment.
    pub session_prefix: String,
    /// When set, spawn rejects project paths outside this root.
    pub project_root: Option<PathBuf>,
    /// Bounded wait before a failed dependency fails its successors.
    pub dep_grace: Duration,
    /// Reminder delay for ralph workers that have not signaled.
    pub ralph_nudge_delay: Duration,
    /// Gap between the init prompt and the caller's initial input.
    pub initial_input_delay: Duration,
    /// Output chunk retention for the daily sweep.
    pub output_retention_days: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:4100".to_string(),
            max_concurrent: 100,
            auto_cleanup_delay: Duration::from_secs(30),
            stale_worker_threshold: Duration::from_secs(30 * 60),
            stall_threshold: Duration::from_secs(5 * 60),
            capture_tick: Duration::from_millis(1000),
            capture_grace: Duration::from_secs(5),
            health_tick: Duration::from_secs(10),
            sentinel_interval: Duration::from_secs(5 * 60),
            cols: 120,
            rows: 40,
            session_prefix: "fleet".to_string(),
            project_root: None,
            dep_grace: Duration::from_secs(60),
            ralph_nudge_delay: Duration::from_secs(60),
            initial_input_delay: Duration::from_secs(1),
            output_retention_days: 7,
        }
    }
}
