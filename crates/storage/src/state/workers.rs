// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle event application.

use super::MaterializedState;
use fleet_core::{ActivityKind, Event, WorkerHealth, WorkerStatus};

pub(super) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::WorkerCreated { worker } => {
            // Promotion and creation share this event: whichever queue held
            // the id loses it, the registry gains it.
            state.pending.remove(&worker.id);
            let fresh = !state.workers.contains_key(&worker.id);
            state.workers.insert(worker.id.clone(), (**worker).clone());

            if fresh {
                if let Some(parent_id) = worker.parent.clone() {
                    if let Some(parent) = state.workers.get_mut(&parent_id) {
                        if !parent.children.contains(&worker.id) {
                            parent.children.push(worker.id.clone());
                        }
                    }
                }
                state.activity.push(
                    worker.created_at_ms,
                    ActivityKind::WorkerStarted,
                    worker.id.clone(),
                    worker.label.clone(),
                    worker.project.clone(),
                    "worker started",
                );
            }
        }

        Event::WorkerPending { worker } => {
            if state.contains(worker.id.as_str()) {
                return;
            }
            state.pending.insert(worker.id.clone(), (**worker).clone());
            if let Some(parent_id) = worker.parent.clone() {
                if let Some(parent) = state.workers.get_mut(&parent_id) {
                    if !parent.children.contains(&worker.id) {
                        parent.children.push(worker.id.clone());
                    }
                }
            }
            state.activity.push(
                worker.created_at_ms,
                ActivityKind::WorkerPending,
                worker.id.clone(),
                worker.label.clone(),
                worker.project.clone(),
                format!("waiting on {} dependencies", worker.depends_on.len()),
            );
        }

        Event::WorkerCompleted { id, at_ms } => {
            if let Some(worker) = state.workers.get_mut(id) {
                if worker.status != WorkerStatus::Completed {
                    worker.status = WorkerStatus::Completed;
                    worker.completed_at_ms = Some(*at_ms);
                    worker.last_activity_ms = worker.last_activity_ms.max(*at_ms);
                    state.activity.push(
                        *at_ms,
                        ActivityKind::WorkerCompleted,
                        worker.id.clone(),
                        worker.label.clone(),
                        worker.project.clone(),
                        "worker completed",
                    );
                }
            }
        }

        Event::WorkerStopped { id, reason } => {
            if let Some(worker) = state.workers.get_mut(id) {
                if !worker.status.is_terminal() {
                    worker.status = WorkerStatus::Stopped;
                    state.activity.push(
                        worker.last_activity_ms,
                        ActivityKind::WorkerStopped,
                        worker.id.clone(),
                        worker.label.clone(),
                        worker.project.clone(),
                        reason.clone(),
                    );
                }
            } else if let Some(worker) = state.pending.remove(id) {
                // A pending worker can only stop by policy (failed
                // dependency); it never had a session to keep.
                state.activity.push(
                    worker.last_activity_ms,
                    ActivityKind::Error,
                    worker.id.clone(),
                    worker.label.clone(),
                    worker.project.clone(),
                    reason.clone(),
                );
            }
        }

        Event::WorkerDeleted { id } => {
            let removed = state.workers.remove(id).or_else(|| state.pending.remove(id));
            if let Some(worker) = removed {
                state.activity.push(
                    worker.last_activity_ms,
                    ActivityKind::WorkerStopped,
                    worker.id.clone(),
                    worker.label.clone(),
                    worker.project.clone(),
                    "worker removed",
                );
            }
        }

        Event::OutputObserved { id, at_ms } => {
            if let Some(worker) = state.workers.get_mut(id) {
                worker.last_output_ms = worker.last_output_ms.max(*at_ms);
                worker.last_activity_ms = worker.last_activity_ms.max(*at_ms);
            }
        }

        Event::InputQueued { id } => {
            if let Some(worker) = state.workers.get_mut(id) {
                worker.queued_commands = worker.queued_commands.saturating_add(1);
            }
        }

        Event::SettingsChanged { id, auto_accept, ralph_mode } => {
            if let Some(worker) = state.workers.get_mut(id) {
                if let Some(v) = auto_accept {
                    worker.auto_accept = *v;
                }
                if let Some(v) = ralph_mode {
                    worker.ralph_mode = *v;
                }
            }
        }

        Event::AutoAcceptPaused { id, paused } => {
            if let Some(worker) = state.workers.get_mut(id) {
                worker.auto_accept_paused = *paused;
                if !*paused {
                    worker.last_auto_accept_hash = None;
                }
            }
        }

        Event::HealthChanged { id, health } => {
            if let Some(worker) = state.workers.get_mut(id) {
                worker.health = *health;
                if *health == WorkerHealth::Dead && worker.status == WorkerStatus::Running {
                    worker.status = WorkerStatus::Error;
                }
            }
        }

        _ => {}
    }
}
