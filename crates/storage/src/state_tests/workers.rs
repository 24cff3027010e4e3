// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::{WorkerHealth, WorkerId};

#[test]
fn created_inserts_into_registry() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));

    let worker = &state.workers["w1"];
    assert_eq!(worker.status, WorkerStatus::Running);
    assert_eq!(worker.project, "acme");
    assert_eq!(state.running_count(), 1);
    assert_eq!(state.activity.len(), 1);
}

#[test]
fn pending_then_created_moves_between_queues() {
    let mut state = MaterializedState::default();
    let record = running_record("w1");
    state.apply_event(&pending(record.clone()));
    assert!(state.pending.contains_key("w1"));
    assert!(!state.workers.contains_key("w1"));

    state.apply_event(&created(record));
    assert!(!state.pending.contains_key("w1"));
    assert!(state.workers.contains_key("w1"));
}

#[test]
fn pending_does_not_shadow_existing_worker() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&pending(running_record("w1")));
    assert!(!state.pending.contains_key("w1"));
}

#[test]
fn completed_is_sticky_and_records_timestamp() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&Event::WorkerCompleted { id: WorkerId::new("w1"), at_ms: 2000 });

    let worker = &state.workers["w1"];
    assert_eq!(worker.status, WorkerStatus::Completed);
    assert_eq!(worker.completed_at_ms, Some(2000));

    // A later stop does not resurrect or downgrade the terminal status.
    state.apply_event(&Event::WorkerStopped { id: WorkerId::new("w1"), reason: "x".into() });
    assert_eq!(state.workers["w1"].status, WorkerStatus::Completed);
}

#[test]
fn deleted_removes_from_either_queue() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&pending(running_record("w2")));

    state.apply_event(&Event::WorkerDeleted { id: WorkerId::new("w1") });
    state.apply_event(&Event::WorkerDeleted { id: WorkerId::new("w2") });

    assert!(state.workers.is_empty());
    assert!(state.pending.is_empty());

    // Deleting a nonexistent worker is a no-op.
    state.apply_event(&Event::WorkerDeleted { id: WorkerId::new("w3") });
    assert!(state.workers.is_empty());
}

#[test]
fn output_observed_bumps_timestamps_monotonically() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&Event::OutputObserved { id: WorkerId::new("w1"), at_ms: 5000 });
    assert_eq!(state.workers["w1"].last_output_ms, 5000);

    // An older observation never rolls the clock back.
    state.apply_event(&Event::OutputObserved { id: WorkerId::new("w1"), at_ms: 3000 });
    assert_eq!(state.workers["w1"].last_output_ms, 5000);
}

#[test]
fn dead_health_forces_error_status() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&Event::HealthChanged {
        id: WorkerId::new("w1"),
        health: WorkerHealth::Dead,
    });
    let worker = &state.workers["w1"];
    assert_eq!(worker.health, WorkerHealth::Dead);
    assert_eq!(worker.status, WorkerStatus::Error);
}

#[test]
fn stalled_health_keeps_running_status() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&Event::HealthChanged {
        id: WorkerId::new("w1"),
        health: WorkerHealth::Stalled,
    });
    let worker = &state.workers["w1"];
    assert_eq!(worker.health, WorkerHealth::Stalled);
    assert_eq!(worker.status, WorkerStatus::Running);
}

#[test]
fn settings_changed_updates_flags() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&Event::SettingsChanged {
        id: WorkerId::new("w1"),
        auto_accept: Some(true),
        ralph_mode: None,
    });
    assert!(state.workers["w1"].auto_accept);
    assert!(!state.workers["w1"].ralph_mode);
}

#[test]
fn autoaccept_resume_clears_last_hash() {
    let mut state = MaterializedState::default();
    let mut record = running_record("w1");
    record.last_auto_accept_hash = Some(42);
    state.apply_event(&created(record));

    state.apply_event(&Event::AutoAcceptPaused { id: WorkerId::new("w1"), paused: true });
    assert!(state.workers["w1"].auto_accept_paused);

    state.apply_event(&Event::AutoAcceptPaused { id: WorkerId::new("w1"), paused: false });
    assert!(!state.workers["w1"].auto_accept_paused);
    assert_eq!(state.workers["w1"].last_auto_accept_hash, None);
}

#[test]
fn parent_children_link_maintained() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("parent01")));

    let mut child = running_record("child001");
    child.parent = Some(WorkerId::new("parent01"));
    state.apply_event(&created(child));

    assert_eq!(state.workers["parent01"].children, vec![WorkerId::new("child001")]);
    let children = state.children_of("parent01");
    assert_eq!(children.len(), 1);

    // Child survives parent removal (weak backref).
    state.apply_event(&Event::WorkerDeleted { id: WorkerId::new("parent01") });
    assert!(state.workers.contains_key("child001"));
    assert!(state.children_of("parent01").is_empty());
}

#[test]
fn siblings_excludes_self() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("parent01")));
    for id in ["child001", "child002", "child003"] {
        let mut child = running_record(id);
        child.parent = Some(WorkerId::new("parent01"));
        state.apply_event(&created(child));
    }
    let siblings = state.siblings_of("child002");
    let ids: Vec<&str> = siblings.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["child001", "child003"]);
}

#[test]
fn input_queued_counts_up() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&Event::InputQueued { id: WorkerId::new("w1") });
    state.apply_event(&Event::InputQueued { id: WorkerId::new("w1") });
    assert_eq!(state.workers["w1"].queued_commands, 2);
}
