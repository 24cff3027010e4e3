// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events that drive state transitions in the system.
//!
//! Durable events flow through the write-ahead log and are replayed into
//! `MaterializedState` on recovery; every handler must therefore be
//! idempotent. `WorkerOutput` is the one push-only variant: capture loops
//! publish it straight to subscribers and it never enters the WAL (chunk
//! content is persisted by the output store instead).

use crate::id::WorkerId;
use crate::ralph::RalphUpdate;
use crate::timer::TimerId;
use crate::worker::{WorkerHealth, WorkerRecord};
use serde::{Deserialize, Serialize};

/// Serializes with `{"type": "event:name", ...fields}` format.
/// Unknown type tags deserialize to `Custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- worker lifecycle --
    /// Worker inserted into the registry with a live session.
    /// Also the pending→running promotion: any pending entry with the same
    /// id is removed in the same application.
    #[serde(rename = "worker:created")]
    WorkerCreated { worker: Box<WorkerRecord> },

    /// Worker parked in the pending queue until its dependencies complete.
    #[serde(rename = "worker:pending")]
    WorkerPending { worker: Box<WorkerRecord> },

    /// Every predecessor of a pending worker has completed.
    #[serde(rename = "worker:deps_satisfied")]
    DepsSatisfied { id: WorkerId },

    /// A completion woke this set of successors, in registration order.
    #[serde(rename = "worker:deps_triggered")]
    DepsTriggered { triggered: Vec<WorkerId> },

    #[serde(rename = "worker:completed")]
    WorkerCompleted { id: WorkerId, at_ms: u64 },

    #[serde(rename = "worker:stopped")]
    WorkerStopped { id: WorkerId, reason: String },

    #[serde(rename = "worker:deleted")]
    WorkerDeleted { id: WorkerId },

    // -- capture --
    /// The capture loop saw the pane change. Content stays out of the WAL.
    #[serde(rename = "worker:output_observed")]
    OutputObserved { id: WorkerId, at_ms: u64 },

    /// Push-only: one captured chunk, fanned out to subscribers.
    #[serde(rename = "worker:output")]
    WorkerOutput { id: WorkerId, chunk: String, at_ms: u64 },

    // -- mutations --
    /// Input queued toward the worker's session.
    #[serde(rename = "worker:input")]
    InputQueued { id: WorkerId },

    #[serde(rename = "worker:settings")]
    SettingsChanged {
        id: WorkerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto_accept: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ralph_mode: Option<bool>,
    },

    #[serde(rename = "worker:autoaccept_paused")]
    AutoAcceptPaused { id: WorkerId, paused: bool },

    #[serde(rename = "worker:health")]
    HealthChanged { id: WorkerId, health: WorkerHealth },

    // -- ralph --
    #[serde(rename = "worker:ralph_signaled")]
    RalphSignaled { id: WorkerId, update: RalphUpdate, at_ms: u64 },

    // -- system --
    #[serde(rename = "timer:start")]
    TimerStart { id: TimerId },

    #[serde(rename = "system:shutdown")]
    Shutdown,

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// The worker this event concerns, if any.
    pub fn worker_id(&self) -> Option<&WorkerId> {
        match self {
            Event::WorkerCreated { worker } | Event::WorkerPending { worker } => Some(&worker.id),
            Event::DepsSatisfied { id }
            | Event::WorkerCompleted { id, .. }
            | Event::WorkerStopped { id, .. }
            | Event::WorkerDeleted { id }
            | Event::OutputObserved { id, .. }
            | Event::WorkerOutput { id, .. }
            | Event::InputQueued { id }
            | Event::SettingsChanged { id, .. }
            | Event::AutoAcceptPaused { id, .. }
            | Event::HealthChanged { id, .. }
            | Event::RalphSignaled { id, .. } => Some(id),
            Event::DepsTriggered { .. }
            | Event::TimerStart { .. }
            | Event::Shutdown
            | Event::Custom => None,
        }
    }

    /// One-line summary for log spans.
    pub fn log_summary(&self) -> String {
        match self {
            Event::WorkerCreated { worker } => {
                format!("worker:created {} ({})", worker.id, worker.label)
            }
            Event::WorkerPending { worker } => {
                format!("worker:pending {} deps={}", worker.id, worker.depends_on.len())
            }
            Event::DepsSatisfied { id } => format!("worker:deps_satisfied {id}"),
            Event::DepsTriggered { triggered } => {
                format!("worker:deps_triggered n={}", triggered.len())
            }
            Event::WorkerCompleted { id, .. } => format!("worker:completed {id}"),
            Event::WorkerStopped { id, reason } => format!("worker:stopped {id} ({reason})"),
            Event::WorkerDeleted { id } => format!("worker:deleted {id}"),
            Event::OutputObserved { id, .. } => format!("worker:output_observed {id}"),
            Event::WorkerOutput { id, chunk, .. } => {
                format!("worker:output {id} ({} bytes)", chunk.len())
            }
            Event::InputQueued { id } => format!("worker:input {id}"),
            Event::SettingsChanged { id, .. } => format!("worker:settings {id}"),
            Event::AutoAcceptPaused { id, paused } => {
                format!("worker:autoaccept_paused {id} paused={paused}")
            }
            Event::HealthChanged { id, health } => format!("worker:health {id} {health}"),
            Event::RalphSignaled { id, update, .. } => {
                format!("worker:ralph_signaled {id} {}", update.status)
            }
            Event::TimerStart { id } => format!("timer:start {id}"),
            Event::Shutdown => "system:shutdown".to_string(),
            Event::Custom => "custom".to_string(),
        }
    }

    /// Whether this event may be written to the WAL. Push-only and control
    /// variants stay out of durable storage.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Event::WorkerOutput { .. } | Event::Shutdown | Event::Custom)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
