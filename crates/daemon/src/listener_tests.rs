// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event_bus::EventBus;
use crate::lifecycle::ListenCtx;
use fleet_adapters::{BackendRegistry, ClaudeBackend, FakeSessionAdapter};
use fleet_core::{FakeClock, SpawnSpec};
use fleet_engine::{EngineConfig, RateLimiter, Runtime, RuntimeDeps};
use fleet_storage::{MaterializedState, OutputStore, Wal};
use parking_lot::Mutex;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, Notify};

struct TestWorld {
    ctx: Arc<ListenCtx<FakeSessionAdapter, FakeClock>>,
    fake: FakeSessionAdapter,
    project: tempfile::TempDir,
    _state_dir: tempfile::TempDir,
    _event_rx: mpsc::Receiver<fleet_core::Event>,
}

fn world() -> TestWorld {
    let state_dir = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let fake = FakeSessionAdapter::new();
    let clock = FakeClock::new();

    let wal = Wal::open(&state_dir.path().join("events.wal"), 0).unwrap();
    let (event_bus, _reader) = EventBus::new(wal);

    let state = Arc::new(Mutex::new(MaterializedState::default()));
    let (event_tx, event_rx) = mpsc::channel(1024);
    let (push_tx, _push_rx) = broadcast::channel(1024);

    let mut config = EngineConfig::default();
    config.capture_tick = std::time::Duration::from_secs(3600);
    let runtime = Runtime::new(RuntimeDeps {
        sessions: fake.clone(),
        state: Arc::clone(&state),
        outputs: Arc::new(OutputStore::open(&state_dir.path().join("outputs")).unwrap()),
        backends: BackendRegistry::with_default(Arc::new(ClaudeBackend::default())),
        clock,
        config,
        event_tx,
        push_tx,
    });

    let ctx = Arc::new(ListenCtx {
        runtime: Arc::new(runtime),
        state,
        event_bus,
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
        limiter: RateLimiter::new(),
    });
    TestWorld { ctx, fake, project, _state_dir: state_dir, _event_rx: event_rx }
}

fn spawn_request(world: &TestWorld, label: &str) -> Request {
    Request::WorkerSpawn {
        spec: SpawnSpec {
            project_path: world.project.path().to_path_buf(),
            label: Some(label.to_string()),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn ping_pong() {
    let world = world();
    assert!(matches!(dispatch(Request::Ping, &world.ctx).await, Response::Pong));
}

#[tokio::test]
async fn spawn_then_get_then_kill_lifecycle() {
    let world = world();

    let spawned = dispatch(spawn_request(&world, "TEST: L"), &world.ctx).await;
    let Response::Spawned { worker, pending } = spawned else {
        panic!("unexpected response: {spawned:?}");
    };
    assert!(!pending);
    assert!(world.fake.session_exists(&worker.session));

    let got = dispatch(Request::WorkerGet { id: worker.id.to_string() }, &world.ctx).await;
    assert!(matches!(got, Response::Worker { .. }));

    let killed = dispatch(
        Request::WorkerKill { id: worker.id.to_string(), force: false },
        &world.ctx,
    )
    .await;
    assert!(matches!(killed, Response::Ok));

    // Kill reflected before the next registry read.
    let gone = dispatch(Request::WorkerGet { id: worker.id.to_string() }, &world.ctx).await;
    match gone {
        Response::Error { kind, .. } => assert_eq!(kind, "not_found"),
        other => panic!("expected not_found, got {other:?}"),
    }
}

#[tokio::test]
async fn list_includes_pending_and_running() {
    let world = world();
    let Response::Spawned { worker: a, .. } =
        dispatch(spawn_request(&world, "A"), &world.ctx).await
    else {
        panic!("spawn failed");
    };
    let dependent = Request::WorkerSpawn {
        spec: SpawnSpec {
            project_path: world.project.path().to_path_buf(),
            depends_on: vec![a.id.clone()],
            ..Default::default()
        },
    };
    let Response::Spawned { pending, .. } = dispatch(dependent, &world.ctx).await else {
        panic!("spawn failed");
    };
    assert!(pending);

    let Response::Workers { workers } = dispatch(Request::WorkerList, &world.ctx).await else {
        panic!("list failed");
    };
    assert_eq!(workers.len(), 2);

    let Response::Pending { workers } = dispatch(Request::WorkerPending, &world.ctx).await
    else {
        panic!("pending failed");
    };
    assert_eq!(workers.len(), 1);
}

#[tokio::test]
async fn complete_reports_triggered_ids() {
    let world = world();
    let Response::Spawned { worker: a, .. } =
        dispatch(spawn_request(&world, "A"), &world.ctx).await
    else {
        panic!("spawn failed");
    };
    let Response::Spawned { worker: b, .. } = dispatch(
        Request::WorkerSpawn {
            spec: SpawnSpec {
                project_path: world.project.path().to_path_buf(),
                depends_on: vec![a.id.clone()],
                ..Default::default()
            },
        },
        &world.ctx,
    )
    .await
    else {
        panic!("spawn failed");
    };

    let Response::Completed { triggered, .. } =
        dispatch(Request::WorkerComplete { id: a.id.to_string() }, &world.ctx).await
    else {
        panic!("complete failed");
    };
    assert_eq!(triggered, vec![b.id.to_string()]);

    // S2: the dependent is observable as running.
    let Response::Worker { worker } =
        dispatch(Request::WorkerGet { id: b.id.to_string() }, &world.ctx).await
    else {
        panic!("get failed");
    };
    assert_eq!(worker.status, fleet_core::WorkerStatus::Running);
}

#[tokio::test]
async fn input_rejects_empty_and_unknown() {
    let world = world();
    let response = dispatch(
        Request::WorkerInput { id: "ghost123".into(), input: String::new() },
        &world.ctx,
    )
    .await;
    match response {
        Response::Error { kind, .. } => assert_eq!(kind, "validation"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let response = dispatch(
        Request::WorkerInput { id: "ghost123".into(), input: "hi".into() },
        &world.ctx,
    )
    .await;
    match response {
        Response::Error { kind, .. } => assert_eq!(kind, "not_found"),
        other => panic!("expected not_found, got {other:?}"),
    }
}

#[tokio::test]
async fn spawn_rate_limit_kicks_in() {
    let world = world();
    for i in 0..5 {
        let response = dispatch(spawn_request(&world, &format!("w{i}")), &world.ctx).await;
        assert!(matches!(response, Response::Spawned { .. }), "spawn {i} failed");
    }
    let response = dispatch(spawn_request(&world, "over"), &world.ctx).await;
    match response {
        Response::Error { kind, .. } => assert_eq!(kind, "rate_limited"),
        other => panic!("expected rate_limited, got {other:?}"),
    }
}

#[tokio::test]
async fn ralph_signal_unknown_token_is_not_found() {
    let world = world();
    let response = dispatch(
        Request::RalphSignal {
            token: "nosuchtok1".into(),
            signal: fleet_core::RalphSignal { status: "done".into(), ..Default::default() },
        },
        &world.ctx,
    )
    .await;
    match response {
        Response::Error { kind, .. } => assert_eq!(kind, "not_found"),
        other => panic!("expected not_found, got {other:?}"),
    }
}

#[tokio::test]
async fn status_counts_workers() {
    let world = world();
    dispatch(spawn_request(&world, "A"), &world.ctx).await;
    let Response::Status { status } = dispatch(Request::Status, &world.ctx).await else {
        panic!("status failed");
    };
    assert_eq!(status.workers, 1);
    assert_eq!(status.running, 1);
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn settings_with_no_fields_is_validation_error() {
    let world = world();
    let Response::Spawned { worker, .. } =
        dispatch(spawn_request(&world, "A"), &world.ctx).await
    else {
        panic!("spawn failed");
    };
    let response = dispatch(
        Request::WorkerSettings {
            id: worker.id.to_string(),
            auto_accept: None,
            ralph_mode: None,
        },
        &world.ctx,
    )
    .await;
    match response {
        Response::Error { kind, .. } => assert_eq!(kind, "validation"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn diagnostics_returns_last_report() {
    let world = world();
    // No sentinel pass yet.
    let Response::Diagnostics { report } = dispatch(Request::Diagnostics, &world.ctx).await
    else {
        panic!("diagnostics failed");
    };
    assert!(report.is_none());

    world.ctx.runtime.run_sentinel().await;
    let Response::Diagnostics { report } = dispatch(Request::Diagnostics, &world.ctx).await
    else {
        panic!("diagnostics failed");
    };
    assert!(report.is_some());
}
