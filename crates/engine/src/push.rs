// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push-event frames for external subscribers.
//!
//! Subscribers receive named JSON frames; delivery is best-effort fan-out
//! with no replay. Frame names are part of the external contract.

use fleet_core::Event;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One frame on the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    pub data: Value,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }
}

/// Map a durable event to its subscriber-visible frames.
///
/// `worker:child:signaled` needs the parent id and is appended by the
/// runtime; `activity:new` frames ride along with the lifecycle events
/// that write activity entries.
pub fn frames_for(event: &Event) -> Vec<PushFrame> {
    match event {
        Event::WorkerCreated { worker } => vec![
            PushFrame::new("worker:created", json!({ "worker": worker })),
            activity_frame("worker_started", worker.id.as_str(), &worker.label),
        ],
        Event::WorkerPending { worker } => vec![
            PushFrame::new("worker:pending", json!({ "worker": worker })),
            activity_frame("worker_pending", worker.id.as_str(), &worker.label),
        ],
        Event::DepsSatisfied { id } => {
            vec![PushFrame::new("worker:dependencies_satisfied", json!({ "workerId": id }))]
        }
        Event::DepsTriggered { triggered } => {
            vec![PushFrame::new("dependencies:triggered", json!({ "triggered": triggered }))]
        }
        Event::WorkerCompleted { id, at_ms } => vec![PushFrame::new(
            "worker:completed",
            json!({ "workerId": id, "completedAt": at_ms }),
        )],
        Event::WorkerStopped { id, reason } => vec![PushFrame::new(
            "worker:updated",
            json!({ "workerId": id, "status": "stopped", "reason": reason }),
        )],
        Event::WorkerDeleted { id } => {
            vec![PushFrame::new("worker:deleted", json!({ "workerId": id }))]
        }
        Event::WorkerOutput { id, chunk, at_ms } => vec![PushFrame::new(
            "worker:output",
            json!({ "workerId": id, "chunk": chunk, "at": at_ms }),
        )],
        Event::SettingsChanged { id, auto_accept, ralph_mode } => vec![PushFrame::new(
            "worker:updated",
            json!({ "workerId": id, "autoAccept": auto_accept, "ralphMode": ralph_mode }),
        )],
        Event::AutoAcceptPaused { id, paused } => vec![PushFrame::new(
            "worker:updated",
            json!({ "workerId": id, "autoAcceptPaused": paused }),
        )],
        Event::HealthChanged { id, health } => vec![PushFrame::new(
            "worker:updated",
            json!({ "workerId": id, "health": health }),
        )],
        Event::RalphSignaled { id, update, .. } => vec![PushFrame::new(
            "worker:ralph:signaled",
            json!({ "workerId": id, "signal": update }),
        )],
        // Internal machinery stays off the push channel.
        Event::OutputObserved { .. }
        | Event::InputQueued { .. }
        | Event::TimerStart { .. }
        | Event::Shutdown
        | Event::Custom => Vec::new(),
    }
}

fn activity_frame(kind: &str, worker_id: &str, label: &str) -> PushFrame {
    PushFrame::new(
        "activity:new",
        json!({ "type": kind, "workerId": worker_id, "workerLabel": label }),
    )
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;
