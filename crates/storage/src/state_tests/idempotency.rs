// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Double-applying any state-bearing event must not distort the registry.

use super::*;
use fleet_core::WorkerId;

#[test]
fn created_twice_keeps_one_entry_and_one_activity_line() {
    let mut state = MaterializedState::default();
    let event = created(running_record("w1"));
    state.apply_event(&event);
    state.apply_event(&event);
    assert_eq!(state.workers.len(), 1);
    assert_eq!(state.activity.len(), 1);
}

#[test]
fn completed_twice_keeps_first_timestamp() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&Event::WorkerCompleted { id: WorkerId::new("w1"), at_ms: 2000 });
    state.apply_event(&Event::WorkerCompleted { id: WorkerId::new("w1"), at_ms: 3000 });
    assert_eq!(state.workers["w1"].completed_at_ms, Some(2000));
    // Exactly one started + one completed activity entry.
    assert_eq!(state.activity.len(), 2);
}

#[test]
fn deleted_twice_is_harmless() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    let event = Event::WorkerDeleted { id: WorkerId::new("w1") };
    state.apply_event(&event);
    state.apply_event(&event);
    assert!(state.workers.is_empty());
}

#[test]
fn pending_twice_keeps_one_entry() {
    let mut state = MaterializedState::default();
    let event = pending(running_record("w1"));
    state.apply_event(&event);
    state.apply_event(&event);
    assert_eq!(state.pending.len(), 1);
    assert_eq!(state.activity.len(), 1);
}

#[test]
fn unique_ids_across_status_classes() {
    // An id can appear in exactly one queue, whatever the event order.
    let mut state = MaterializedState::default();
    let record = running_record("w1");
    state.apply_event(&pending(record.clone()));
    state.apply_event(&created(record.clone()));
    state.apply_event(&pending(record));
    let in_registry = state.workers.contains_key("w1") as usize;
    let in_pending = state.pending.contains_key("w1") as usize;
    assert_eq!(in_registry + in_pending, 1);
}

#[test]
fn state_survives_serde_round_trip() {
    let mut state = MaterializedState::default();
    state.apply_event(&created(running_record("w1")));
    state.apply_event(&pending(running_record("w2")));

    let json = serde_json::to_string(&state).unwrap();
    let back: MaterializedState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.workers.len(), 1);
    assert_eq!(back.pending.len(), 1);
    assert_eq!(back.workers["w1"], state.workers["w1"]);
}
