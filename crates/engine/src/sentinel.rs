// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sentinel: periodic self-diagnostics.
//!
//! Every tick produces a structured report covering the process, the worker
//! population, multiplexer/registry coherence, the circuit breaker, a
//! bounded set of per-worker probes, and Ralph stalls. Reports accumulate
//! in a rolling 24 h window (288 entries at the 5-minute default).

use fleet_adapters::{BreakerSnapshot, SessionAdapter};
use fleet_core::{Clock, WorkerHealth, WorkerId, WorkerStatus};
use fleet_storage::MaterializedState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// History capacity: 24 h at one report per 5 minutes.
const HISTORY_CAP: usize = 288;

/// Per-tick cap on per-worker session probes.
const PROBE_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentinelStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStats {
    pub rss_bytes: u64,
    pub uptime_s: u64,
    pub loop_lag_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub total: usize,
    pub running: usize,
    pub pending: usize,
    pub stalled: usize,
    pub dead: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProbe {
    pub id: WorkerId,
    pub current_command: String,
    pub expected: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelReport {
    pub at_ms: u64,
    pub status: SentinelStatus,
    pub process: ProcessStats,
    pub workers: WorkerCounts,
    /// Running workers whose session is gone (issues).
    pub workers_without_sessions: Vec<WorkerId>,
    /// Prefix-matching sessions unknown to the registry (warnings).
    pub sessions_without_workers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaker: Option<BreakerSnapshot>,
    pub probes: Vec<WorkerProbe>,
    /// Running ralph workers with no signal past the stall threshold.
    pub ralph_stalls: Vec<WorkerId>,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Inputs for one sentinel pass.
pub struct SentinelInputs<'a, S> {
    pub state: &'a Arc<Mutex<MaterializedState>>,
    pub sessions: &'a S,
    pub breaker: Option<BreakerSnapshot>,
    pub session_prefix: &'a str,
    /// Expected pane command (first word of the backend command).
    pub backend_command: &'a str,
    /// Ralph stall threshold.
    pub stall_after: Duration,
}

/// Rolling diagnostics state.
pub struct Sentinel {
    started: Instant,
    history: Mutex<VecDeque<SentinelReport>>,
}

impl Sentinel {
    pub fn new() -> Self {
        Self { started: Instant::now(), history: Mutex::new(VecDeque::new()) }
    }

    /// Run one diagnostic pass and record it in the history.
    pub async fn run<S: SessionAdapter, C: Clock>(
        &self,
        inputs: SentinelInputs<'_, S>,
        clock: &C,
    ) -> SentinelReport {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let loop_lag_ms = measure_loop_lag().await;
        let process = ProcessStats {
            rss_bytes: read_rss_bytes().unwrap_or(0),
            uptime_s: self.started.elapsed().as_secs(),
            loop_lag_ms,
        };

        // Registry census under one short lock.
        let (counts, running, ralph_candidates) = {
            let state = inputs.state.lock();
            let mut counts = WorkerCounts {
                total: state.workers.len() + state.pending.len(),
                pending: state.pending.len(),
                ..Default::default()
            };
            let mut running = Vec::new();
            let mut ralph_candidates = Vec::new();
            let now_ms = clock.epoch_ms();
            for worker in state.workers.values() {
                match worker.status {
                    WorkerStatus::Running => counts.running += 1,
                    WorkerStatus::Error => counts.error += 1,
                    _ => {}
                }
                match worker.health {
                    WorkerHealth::Stalled => counts.stalled += 1,
                    WorkerHealth::Dead => counts.dead += 1,
                    WorkerHealth::Healthy => {}
                }
                if worker.status == WorkerStatus::Running {
                    running.push((worker.id.clone(), worker.session.clone()));
                    let unsignaled = worker.ralph_status.is_none()
                        || worker.ralph_status == Some(fleet_core::RalphStatus::Pending);
                    if worker.ralph_mode
                        && unsignaled
                        && now_ms.saturating_sub(worker.created_at_ms)
                            > inputs.stall_after.as_millis() as u64
                    {
                        ralph_candidates.push(worker.id.clone());
                    }
                }
            }
            (counts, running, ralph_candidates)
        };

        // Multiplexer liveness: cross the registry with the session list.
        let mut workers_without_sessions = Vec::new();
        let mut sessions_without_workers = Vec::new();
        match inputs.sessions.list_sessions().await {
            Ok(sessions) => {
                let live: HashSet<&str> = sessions.iter().map(|s| s.as_str()).collect();
                let owned: HashSet<&str> = running.iter().map(|(_, s)| s.as_str()).collect();
                for (id, session) in &running {
                    if !live.contains(session.as_str()) {
                        workers_without_sessions.push(id.clone());
                    }
                }
                let prefix = format!("{}-", inputs.session_prefix);
                for session in &sessions {
                    if session.starts_with(&prefix) && !owned.contains(session.as_str()) {
                        sessions_without_workers.push(session.clone());
                    }
                }
            }
            Err(e) => issues.push(format!("failed to list sessions: {e}")),
        }
        for id in &workers_without_sessions {
            issues.push(format!("worker {id} has no session"));
        }
        if !sessions_without_workers.is_empty() {
            warnings.push(format!(
                "{} orphan sessions with the worker prefix",
                sessions_without_workers.len()
            ));
        }

        // Per-worker probes, capped per tick.
        let mut probes = Vec::new();
        for (id, session) in running.iter().take(PROBE_CAP) {
            match inputs.sessions.current_command(session).await {
                Ok(current_command) => {
                    if !current_command.is_empty()
                        && current_command != inputs.backend_command
                    {
                        warnings.push(format!(
                            "worker {id} pane runs {current_command:?}, expected {:?}",
                            inputs.backend_command
                        ));
                    }
                    probes.push(WorkerProbe {
                        id: id.clone(),
                        current_command,
                        expected: inputs.backend_command.to_string(),
                    });
                }
                Err(_) if workers_without_sessions.contains(id) => {
                    // Already an issue above
                }
                Err(e) => issues.push(format!("worker {id} probe failed: {e}")),
            }
        }

        if let Some(breaker) = &inputs.breaker {
            if breaker.tripped {
                issues.push("session circuit breaker tripped".to_string());
            }
        }

        for id in &ralph_candidates {
            warnings.push(format!("ralph worker {id} has not signaled"));
        }

        let status = if !issues.is_empty() {
            SentinelStatus::Unhealthy
        } else if !warnings.is_empty() {
            SentinelStatus::Degraded
        } else {
            SentinelStatus::Healthy
        };

        let report = SentinelReport {
            at_ms: clock.epoch_ms(),
            status,
            process,
            workers: counts,
            workers_without_sessions,
            sessions_without_workers,
            breaker: inputs.breaker,
            probes,
            ralph_stalls: ralph_candidates,
            issues,
            warnings,
        };

        let mut history = self.history.lock();
        history.push_back(report.clone());
        while history.len() > HISTORY_CAP {
            history.pop_front();
        }
        report
    }

    /// Most recent report.
    pub fn last(&self) -> Option<SentinelReport> {
        self.history.lock().back().cloned()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}

impl Default for Sentinel {
    fn default() -> Self {
        Self::new()
    }
}

/// One scheduling-tick probe of event-loop responsiveness.
async fn measure_loop_lag() -> u64 {
    let before = Instant::now();
    tokio::task::yield_now().await;
    before.elapsed().as_millis() as u64
}

/// Resident set size from /proc (0 where unavailable).
fn read_rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * 4096)
}

#[cfg(test)]
#[path = "sentinel_tests.rs"]
mod tests;
