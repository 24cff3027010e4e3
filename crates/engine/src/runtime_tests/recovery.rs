// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart recovery: reattach, drop, adopt, promote.

use super::*;

/// Build a second runtime over the same fake adapter with state carried
/// over, as the daemon does from a snapshot.
fn reincarnate(rig: &Rig) -> Rig {
    let carried = rig.runtime.state().lock().clone();
    let project = tempfile::tempdir().unwrap();
    let outputs_dir = tempfile::tempdir().unwrap();
    let clock = rig.clock.clone();
    let (event_tx, event_rx) = mpsc::channel(1024);
    let (push_tx, push_rx) = broadcast::channel(1024);

    let mut config = EngineConfig::default();
    config.capture_tick = Duration::from_secs(3600);
    let deps = RuntimeDeps {
        sessions: rig.fake.clone(),
        state: Arc::new(Mutex::new(carried)),
        outputs: Arc::new(OutputStore::open(outputs_dir.path()).unwrap()),
        backends: BackendRegistry::with_default(Arc::new(ClaudeBackend::default())),
        clock: clock.clone(),
        config,
        event_tx,
        push_tx,
    };
    Rig {
        runtime: Runtime::new(deps),
        fake: rig.fake.clone(),
        clock,
        event_rx,
        push_rx,
        project,
        _outputs: outputs_dir,
    }
}

#[tokio::test]
async fn restore_reattaches_live_sessions_and_drops_dead_ones() {
    let mut rig = Rig::new();
    let alive = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let dead = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;

    // One session survives the "restart", one does not.
    rig.fake.remove_session(&dead.session);

    let mut next = reincarnate(&rig);
    next.runtime.restore().await.unwrap();
    next.pump().await;

    assert_eq!(next.status_of(alive.id.as_str()), Some(WorkerStatus::Running));
    assert!(next.runtime.get_worker(dead.id.as_str()).is_none());

    // Output flows again through a fresh capture registration.
    assert!(next.runtime.worker_output(alive.id.as_str()).is_ok());
}

#[tokio::test]
async fn restore_adopts_ralph_tokens() {
    let mut rig = Rig::new();
    let worker = rig
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;
    let token = worker.ralph_token.clone().unwrap();

    let mut next = reincarnate(&rig);
    next.runtime.restore().await.unwrap();
    next.pump().await;

    let updated = next
        .runtime
        .ralph_signal(
            &token,
            fleet_core::RalphSignal { status: "in_progress".into(), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated.ralph_status, Some(fleet_core::RalphStatus::InProgress));
}

#[tokio::test]
async fn restore_promotes_pending_whose_deps_completed_before_crash() {
    let mut rig = Rig::new();
    let a = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let b = rig
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;

    // Simulate a crash after the completion event landed but before the
    // promotion finished: mark completed in state only.
    rig.runtime
        .state()
        .lock()
        .apply_event(&Event::WorkerCompleted { id: a.id.clone(), at_ms: rig.clock.epoch_ms() });

    let mut next = reincarnate(&rig);
    next.runtime.restore().await.unwrap();
    next.pump().await;

    assert_eq!(next.status_of(b.id.as_str()), Some(WorkerStatus::Running));
    assert!(next.fake.session_exists(&b.session));
}

#[tokio::test]
async fn discovery_adopts_prefixed_orphan_sessions() {
    let rig = Rig::new();
    rig.fake.add_session("fleet-orphan99");
    rig.fake.set_current_path("fleet-orphan99", "/proj/legacy-api");
    rig.fake.add_session("unrelated-session");

    let mut next = reincarnate(&rig);
    next.runtime.restore().await.unwrap();
    next.pump().await;

    let adopted = next.runtime.get_worker("orphan99").unwrap();
    assert_eq!(adopted.status, WorkerStatus::Running);
    assert_eq!(adopted.label, "legacy-api");
    assert_eq!(adopted.session, "fleet-orphan99");

    // The unrelated session was left alone.
    let state = next.runtime.state();
    let state = state.lock();
    assert!(!state.workers.values().any(|w| w.session == "unrelated-session"));
}
