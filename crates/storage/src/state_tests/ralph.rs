// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::{RalphSignal, RalphStatus, WorkerId};

fn signal(status: &str) -> RalphSignal {
    RalphSignal { status: status.into(), ..Default::default() }
}

fn signaled(id: &str, raw: RalphSignal, at_ms: u64) -> Event {
    Event::RalphSignaled { id: WorkerId::new(id), update: raw.sanitize(), at_ms }
}

#[test]
fn in_progress_merges_without_signaled_at() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));

    let raw = RalphSignal {
        status: "in_progress".into(),
        progress: Some(30.0),
        current_step: Some("Running tests".into()),
        ..Default::default()
    };
    state.apply_event(&signaled("w1", raw, 2000));

    let worker = &state.workers["w1"];
    assert_eq!(worker.ralph_status, Some(RalphStatus::InProgress));
    assert_eq!(worker.ralph_progress, Some(30));
    assert_eq!(worker.ralph_current_step.as_deref(), Some("Running tests"));
    assert_eq!(worker.ralph_signaled_at_ms, None);
}

#[test]
fn terminal_signal_sets_signaled_at_and_merges_outputs() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));

    let raw = RalphSignal {
        status: "done".into(),
        learnings: Some("ok".into()),
        outputs: [("k".to_string(), serde_json::json!("v"))].into_iter().collect(),
        artifacts: vec!["/tmp/report.md".into()],
        ..Default::default()
    };
    state.apply_event(&signaled("w1", raw, 9000));

    let worker = &state.workers["w1"];
    assert_eq!(worker.ralph_status, Some(RalphStatus::Done));
    assert_eq!(worker.ralph_signaled_at_ms, Some(9000));
    assert_eq!(worker.ralph_learnings.as_deref(), Some("ok"));
    assert_eq!(worker.ralph_outputs["k"], serde_json::json!("v"));
    assert_eq!(worker.ralph_artifacts, vec!["/tmp/report.md".to_string()]);
}

#[test]
fn terminal_state_not_overwritten_by_late_in_progress() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));

    state.apply_event(&signaled("w1", signal("done"), 5000));
    state.apply_event(&signaled("w1", signal("in_progress"), 6000));

    let worker = &state.workers["w1"];
    assert_eq!(worker.ralph_status, Some(RalphStatus::Done));
    assert_eq!(worker.ralph_signaled_at_ms, Some(5000));
}

#[test]
fn blocked_after_done_still_merges() {
    // Terminal to terminal transitions carry new information (reason).
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&signaled("w1", signal("done"), 5000));

    let raw = RalphSignal {
        status: "blocked".into(),
        reason: Some("missing credentials".into()),
        ..Default::default()
    };
    state.apply_event(&signaled("w1", raw, 7000));
    assert_eq!(state.workers["w1"].ralph_status, Some(RalphStatus::Blocked));
}

#[test]
fn signal_for_unknown_worker_is_ignored() {
    let mut state = MaterializedState::default();
    state.apply_event(&signaled("ghost123", signal("done"), 1));
    assert!(state.workers.is_empty());
}

#[test]
fn artifacts_do_not_duplicate_across_signals() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));

    let raw = RalphSignal {
        status: "in_progress".into(),
        artifacts: vec!["/tmp/a".into()],
        ..Default::default()
    };
    state.apply_event(&signaled("w1", raw.clone(), 1));
    state.apply_event(&signaled("w1", raw, 2));
    assert_eq!(state.workers["w1"].ralph_artifacts.len(), 1);
}
