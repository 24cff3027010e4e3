// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::{SpawnSpec, WorkerId, WorkerRecord};
use std::path::PathBuf;

fn record(id: &str) -> WorkerRecord {
    let wid = WorkerId::new(id);
    let spec = SpawnSpec { project_path: PathBuf::from("/p/acme"), ..Default::default() };
    WorkerRecord::from_spec(wid.clone(), wid.session_name("fleet"), &spec, 1000)
}

#[test]
fn created_maps_to_created_plus_activity() {
    let frames = frames_for(&Event::WorkerCreated { worker: Box::new(record("w1")) });
    let names: Vec<&str> = frames.iter().map(|f| f.event.as_str()).collect();
    assert_eq!(names, vec!["worker:created", "activity:new"]);
    assert_eq!(frames[0].data["worker"]["id"], "w1");
}

#[test]
fn deps_satisfied_carries_worker_id() {
    let frames = frames_for(&Event::DepsSatisfied { id: WorkerId::new("w2") });
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event, "worker:dependencies_satisfied");
    assert_eq!(frames[0].data["workerId"], "w2");
}

#[test]
fn output_event_carries_chunk() {
    let frames = frames_for(&Event::WorkerOutput {
        id: WorkerId::new("w1"),
        chunk: "hi".into(),
        at_ms: 5,
    });
    assert_eq!(frames[0].event, "worker:output");
    assert_eq!(frames[0].data["chunk"], "hi");
}

#[test]
fn internal_events_produce_no_frames() {
    assert!(frames_for(&Event::OutputObserved { id: WorkerId::new("w"), at_ms: 1 }).is_empty());
    assert!(frames_for(&Event::Shutdown).is_empty());
    assert!(
        frames_for(&Event::TimerStart { id: fleet_core::TimerId::new("init-prompt:w") })
            .is_empty()
    );
}

#[test]
fn health_maps_to_worker_updated() {
    let frames = frames_for(&Event::HealthChanged {
        id: WorkerId::new("w1"),
        health: fleet_core::WorkerHealth::Stalled,
    });
    assert_eq!(frames[0].event, "worker:updated");
    assert_eq!(frames[0].data["health"], "stalled");
}
