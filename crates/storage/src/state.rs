// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.
//!
//! State is derived from events: events are facts about what happened,
//! state is the fold over them. Handlers are written to be idempotent:
//! applying an event twice must land in the same state as applying it once,
//! so crash-recovery replay can overlap a prior partial application.

mod ralph;
mod workers;

use fleet_core::{ActivityLog, Event, WorkerId, WorkerRecord, WorkerStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Materialized state built from event replay.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    /// Registry: workers with (or that had) a session.
    pub workers: HashMap<WorkerId, WorkerRecord>,
    /// Dependency-gated workers waiting to start.
    #[serde(default)]
    pub pending: HashMap<WorkerId, WorkerRecord>,
    /// Recent lifecycle activity, oldest first.
    #[serde(default)]
    pub activity: ActivityLog,
}

impl MaterializedState {
    /// Worker by id, registry first, then the pending queue.
    pub fn get_worker(&self, id: &str) -> Option<&WorkerRecord> {
        self.workers.get(id).or_else(|| self.pending.get(id))
    }

    /// All workers of a project (registry + pending).
    pub fn workers_for_project(&self, project: &str) -> Vec<&WorkerRecord> {
        self.workers
            .values()
            .chain(self.pending.values())
            .filter(|w| w.project == project)
            .collect()
    }

    /// Registry workers with `status == running`.
    pub fn running_count(&self) -> usize {
        self.workers.values().filter(|w| w.status == WorkerStatus::Running).count()
    }

    /// Children of a worker that still exist, in the parent's recorded order.
    pub fn children_of(&self, id: &str) -> Vec<&WorkerRecord> {
        let Some(parent) = self.get_worker(id) else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .filter_map(|child| self.get_worker(child.as_str()))
            .collect()
    }

    /// Workers sharing this worker's parent, excluding itself.
    pub fn siblings_of(&self, id: &str) -> Vec<&WorkerRecord> {
        let Some(parent_id) = self.get_worker(id).and_then(|w| w.parent.clone()) else {
            return Vec::new();
        };
        self.children_of(parent_id.as_str())
            .into_iter()
            .filter(|w| w.id != id)
            .collect()
    }

    /// Whether an id exists anywhere (registry or pending).
    pub fn contains(&self, id: &str) -> bool {
        self.workers.contains_key(id) || self.pending.contains_key(id)
    }

    /// Apply an event to derive state changes.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::WorkerCreated { .. }
            | Event::WorkerPending { .. }
            | Event::WorkerCompleted { .. }
            | Event::WorkerStopped { .. }
            | Event::WorkerDeleted { .. }
            | Event::OutputObserved { .. }
            | Event::InputQueued { .. }
            | Event::SettingsChanged { .. }
            | Event::AutoAcceptPaused { .. }
            | Event::HealthChanged { .. } => workers::apply(self, event),

            Event::RalphSignaled { .. } => ralph::apply(self, event),

            // Signal/control events that don't change persisted state
            Event::DepsSatisfied { .. }
            | Event::DepsTriggered { .. }
            | Event::WorkerOutput { .. }
            | Event::TimerStart { .. }
            | Event::Shutdown
            | Event::Custom => {}
        }
    }
}

#[cfg(test)]
#[path = "state_tests/mod.rs"]
mod tests;
