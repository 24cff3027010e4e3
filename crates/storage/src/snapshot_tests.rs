// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{Checkpointer, MaterializedState};
use fleet_core::{Event, SpawnSpec, WorkerId, WorkerRecord, WorkerStatus};

fn created(id: &str) -> Event {
    let wid = WorkerId::new(id);
    let spec =
        SpawnSpec { project_path: std::path::PathBuf::from("/proj/acme"), ..Default::default() };
    let mut record = WorkerRecord::from_spec(wid.clone(), wid.session_name("fleet"), &spec, 1000);
    record.status = WorkerStatus::Running;
    Event::WorkerCreated { worker: Box::new(record) }
}

#[test]
fn load_missing_snapshot_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_snapshot(&dir.path().join("snapshot.zst")).unwrap();
    assert!(result.is_none());
}

#[test]
fn checkpoint_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let mut state = MaterializedState::default();
    state.apply_event(&created("w1"));

    let checkpointer = Checkpointer::new(path.clone());
    let result = checkpointer.checkpoint_sync(42, &state).unwrap();
    assert_eq!(result.seq, 42);
    assert!(result.size_bytes > 0);

    let snapshot = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(snapshot.seq, 42);
    assert_eq!(snapshot.version, CURRENT_SNAPSHOT_VERSION);
    assert!(snapshot.state.workers.contains_key("w1"));
}

#[test]
fn newer_snapshot_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let snapshot = Snapshot {
        version: CURRENT_SNAPSHOT_VERSION + 1,
        seq: 1,
        state: MaterializedState::default(),
        created_at: chrono::Utc::now(),
    };
    let json = serde_json::to_vec(&snapshot).unwrap();
    let compressed = zstd::encode_all(json.as_slice(), 3).unwrap();
    std::fs::write(&path, compressed).unwrap();

    assert!(matches!(
        load_snapshot(&path),
        Err(SnapshotError::VersionTooNew { .. })
    ));
}
