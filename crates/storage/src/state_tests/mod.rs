// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod idempotency;
mod ralph;
mod workers;

use super::MaterializedState;
use fleet_core::{Event, SpawnSpec, WorkerId, WorkerRecord, WorkerStatus};
use std::path::PathBuf;

/// Build a running-status record the way the spawn path does.
pub(crate) fn running_record(id: &str) -> WorkerRecord {
    let wid = WorkerId::new(id);
    let spec = SpawnSpec { project_path: PathBuf::from("/proj/acme"), ..Default::default() };
    let mut record = WorkerRecord::from_spec(wid.clone(), wid.session_name("fleet"), &spec, 1000);
    record.status = WorkerStatus::Running;
    record
}

pub(crate) fn created(record: WorkerRecord) -> Event {
    Event::WorkerCreated { worker: Box::new(record) }
}

pub(crate) fn pending(record: WorkerRecord) -> Event {
    let mut record = record;
    record.status = WorkerStatus::Pending;
    Event::WorkerPending { worker: Box::new(record) }
}
