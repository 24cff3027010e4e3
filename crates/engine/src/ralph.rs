// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ralph completion tokens and children roll-ups.

use fleet_core::{generate_token, RalphStatus, WorkerHealth, WorkerId, WorkerRecord, TOKEN_TTL_MS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct TokenEntry {
    worker: WorkerId,
    issued_at_ms: u64,
}

/// Completion-token map: token → worker, 4 h TTL, single-issue, consumed
/// on terminal signals.
#[derive(Default)]
pub struct TokenRegistry {
    inner: Mutex<HashMap<String, TokenEntry>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for a worker.
    pub fn issue(&self, worker: WorkerId, now_ms: u64) -> String {
        let token = generate_token();
        self.inner
            .lock()
            .insert(token.clone(), TokenEntry { worker, issued_at_ms: now_ms });
        token
    }

    /// Re-adopt a persisted token after restart.
    pub fn adopt(&self, token: String, worker: WorkerId, issued_at_ms: u64) {
        self.inner.lock().insert(token, TokenEntry { worker, issued_at_ms });
    }

    /// Resolve a token to its worker. Expired tokens are dropped and
    /// resolve to `None`.
    pub fn resolve(&self, token: &str, now_ms: u64) -> Option<WorkerId> {
        let mut inner = self.inner.lock();
        let entry = inner.get(token)?;
        if now_ms.saturating_sub(entry.issued_at_ms) > TOKEN_TTL_MS {
            inner.remove(token);
            return None;
        }
        Some(entry.worker.clone())
    }

    /// Consume a token after a terminal signal.
    pub fn consume(&self, token: &str) {
        self.inner.lock().remove(token);
    }

    /// Drop every token belonging to a worker (kill/cleanup).
    pub fn revoke_worker(&self, worker: &WorkerId) {
        self.inner.lock().retain(|_, entry| &entry.worker != worker);
    }

    /// Periodic sweep of expired tokens. Returns how many were removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.len();
        inner.retain(|_, entry| now_ms.saturating_sub(entry.issued_at_ms) <= TOKEN_TTL_MS);
        before - inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Per-child status line in a roll-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildStatus {
    pub id: WorkerId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub duration_ms: u64,
    pub health: WorkerHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ralph_status: Option<RalphStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ralph_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ralph_current_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ralph_signaled_at_ms: Option<u64>,
}

/// Counts by reported status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildrenSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
}

/// A parent's view of its children without reading raw output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildrenRollup {
    pub summary: ChildrenSummary,
    pub children: Vec<ChildStatus>,
}

/// Build the roll-up from child records.
pub fn rollup(children: &[&WorkerRecord], now_ms: u64) -> ChildrenRollup {
    let mut summary = ChildrenSummary { total: children.len(), ..Default::default() };
    let children = children
        .iter()
        .map(|child| {
            match child.ralph_status {
                Some(RalphStatus::Done) => summary.done += 1,
                Some(RalphStatus::Blocked) => summary.blocked += 1,
                Some(RalphStatus::InProgress) => summary.in_progress += 1,
                Some(RalphStatus::Pending) | None => summary.pending += 1,
            }
            ChildStatus {
                id: child.id.clone(),
                label: child.label.clone(),
                task: child.task_summary().map(|t| t.to_string()),
                duration_ms: now_ms.saturating_sub(child.created_at_ms),
                health: child.health,
                ralph_status: child.ralph_status,
                ralph_progress: child.ralph_progress,
                ralph_current_step: child.ralph_current_step.clone(),
                ralph_signaled_at_ms: child.ralph_signaled_at_ms,
            }
        })
        .collect();
    ChildrenRollup { summary, children }
}

#[cfg(test)]
#[path = "ralph_tests.rs"]
mod tests;
