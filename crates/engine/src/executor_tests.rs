// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_adapters::{FakeSessionAdapter, SessionCall};
use fleet_core::{FakeClock, TimerId, WorkerId};
use std::path::Path;

fn executor(
    fake: FakeSessionAdapter,
) -> (Executor<FakeSessionAdapter, FakeClock>, mpsc::Receiver<Event>, Arc<Mutex<MaterializedState>>)
{
    let state = Arc::new(Mutex::new(MaterializedState::default()));
    let scheduler = Arc::new(Mutex::new(Scheduler::new()));
    let (tx, rx) = mpsc::channel(64);
    let exec = Executor::new(fake, Arc::clone(&state), scheduler, FakeClock::new(), tx);
    (exec, rx, state)
}

#[tokio::test]
async fn emit_applies_immediately_and_forwards() {
    let (exec, mut rx, state) = executor(FakeSessionAdapter::new());

    let id = WorkerId::new("ab12cd34");
    let spec = fleet_core::SpawnSpec {
        project_path: std::path::PathBuf::from("/p"),
        ..Default::default()
    };
    let mut record =
        fleet_core::WorkerRecord::from_spec(id.clone(), id.session_name("fleet"), &spec, 1);
    record.status = fleet_core::WorkerStatus::Running;

    exec.execute(Effect::Emit { event: Event::WorkerCreated { worker: Box::new(record) } })
        .await
        .unwrap();

    // Visible before the bus round-trip.
    assert!(state.lock().workers.contains_key("ab12cd34"));
    assert!(matches!(rx.recv().await, Some(Event::WorkerCreated { .. })));
}

#[tokio::test]
async fn input_queued_waits_for_bus_application() {
    let (exec, mut rx, state) = executor(FakeSessionAdapter::new());
    exec.execute(Effect::Emit { event: Event::InputQueued { id: WorkerId::new("w") } })
        .await
        .unwrap();
    // No immediate apply: the single application happens at the bus.
    assert!(state.lock().workers.is_empty());
    assert!(matches!(rx.recv().await, Some(Event::InputQueued { .. })));
}

#[tokio::test]
async fn session_effects_reach_the_adapter() {
    let fake = FakeSessionAdapter::new();
    fake.create("fleet-a", Path::new("/p"), 120, 40, "x").await.unwrap();
    let (exec, _rx, _state) = executor(fake.clone());

    exec.execute(Effect::SendEnter { session: "fleet-a".into() }).await.unwrap();
    exec.execute(Effect::SendLiteral { session: "fleet-a".into(), text: "echo hi".into() })
        .await
        .unwrap();
    exec.execute(Effect::ResizeSession { session: "fleet-a".into(), cols: 80, rows: 24 })
        .await
        .unwrap();

    let calls = fake.calls();
    assert!(calls.contains(&SessionCall::SendEnter { name: "fleet-a".into() }));
    assert!(calls
        .contains(&SessionCall::SendLiteral { name: "fleet-a".into(), text: "echo hi".into() }));
    assert!(calls.contains(&SessionCall::Resize { name: "fleet-a".into(), cols: 80, rows: 24 }));
}

#[tokio::test]
async fn set_timer_lands_in_scheduler() {
    let (exec, _rx, _state) = executor(FakeSessionAdapter::new());
    let scheduler = exec.scheduler();
    exec.execute(Effect::SetTimer {
        id: TimerId::auto_cleanup(&WorkerId::new("w1")),
        duration: Duration::from_secs(30),
    })
    .await
    .unwrap();
    assert!(scheduler.lock().has_timers());

    exec.execute(Effect::CancelTimer { id: TimerId::auto_cleanup(&WorkerId::new("w1")) })
        .await
        .unwrap();
    assert!(!scheduler.lock().has_timers());
}

#[tokio::test]
async fn context_file_write_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("FLEET.md");
    let (exec, _rx, _state) = executor(FakeSessionAdapter::new());

    exec.execute(Effect::WriteContextFile { path: path.clone(), contents: "# ctx".into() })
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# ctx");

    exec.execute(Effect::RemoveContextFile { path: path.clone() }).await.unwrap();
    assert!(!path.exists());

    // Removing again is fine.
    exec.execute(Effect::RemoveContextFile { path }).await.unwrap();
}
