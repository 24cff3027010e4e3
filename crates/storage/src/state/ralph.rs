// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ralph signal merging.

use super::MaterializedState;
use fleet_core::Event;

pub(super) fn apply(state: &mut MaterializedState, event: &Event) {
    let Event::RalphSignaled { id, update, at_ms } = event else {
        return;
    };
    let Some(worker) = state.workers.get_mut(id) else {
        return;
    };

    // Terminal states are sticky: a done/blocked already on the record
    // is never overwritten by a late non-terminal signal.
    let current_terminal = worker.ralph_status.map(|s| s.is_terminal()).unwrap_or(false);
    if current_terminal && !update.status.is_terminal() {
        return;
    }

    worker.ralph_status = Some(update.status);
    if update.progress.is_some() {
        worker.ralph_progress = update.progress;
    }
    if update.current_step.is_some() {
        worker.ralph_current_step = update.current_step.clone();
    }
    if update.learnings.is_some() {
        worker.ralph_learnings = update.learnings.clone();
    }
    if !update.outputs.is_empty() {
        worker.ralph_outputs.extend(update.outputs.clone());
    }
    if !update.artifacts.is_empty() {
        for artifact in &update.artifacts {
            if !worker.ralph_artifacts.contains(artifact) {
                worker.ralph_artifacts.push(artifact.clone());
            }
        }
    }
    if update.status.is_terminal() {
        worker.ralph_signaled_at_ms = Some(*at_ms);
    }
    worker.last_activity_ms = worker.last_activity_ms.max(*at_ms);
}
