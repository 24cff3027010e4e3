// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::RuntimeError;

#[tokio::test]
async fn spawn_brings_a_session_up() {
    let mut rig = Rig::new();
    let outcome = rig
        .runtime
        .spawn(SpawnSpec { label: Some("TEST: L".into()), ..rig.spec() })
        .await
        .unwrap();

    assert!(!outcome.pending);
    assert_eq!(outcome.worker.status, WorkerStatus::Running);
    assert_eq!(outcome.worker.label, "TEST: L");
    assert!(rig.fake.session_exists(&outcome.worker.session));
    assert!(rig.context_file().exists());

    // Read-your-writes: the registry already has the worker.
    assert_eq!(rig.status_of(outcome.worker.id.as_str()), Some(WorkerStatus::Running));

    rig.pump().await;
    let frames = rig.drain_push();
    assert!(frames.iter().any(|f| f.event == "worker:created"));
    assert!(frames.iter().any(|f| f.event == "activity:new"));
}

#[tokio::test]
async fn spawn_uses_configured_geometry() {
    let mut config = EngineConfig::default();
    config.cols = 100;
    config.rows = 30;
    let rig = Rig::with_config(config);
    let outcome = rig.runtime.spawn(rig.spec()).await.unwrap();

    let created = rig.fake.calls().into_iter().find_map(|c| match c {
        fleet_adapters::SessionCall::Create { name, cols, rows, command, .. } => {
            Some((name, cols, rows, command))
        }
        _ => None,
    });
    let (name, cols, rows, command) = created.unwrap();
    assert_eq!(name, outcome.worker.session);
    assert_eq!((cols, rows), (100, 30));
    assert_eq!(command, "claude");
}

#[tokio::test]
async fn label_boundary_256_accepted_257_rejected() {
    let rig = Rig::new();
    let ok = rig
        .runtime
        .spawn(SpawnSpec { label: Some("x".repeat(256)), ..rig.spec() })
        .await;
    assert!(ok.is_ok());

    let err = rig
        .runtime
        .spawn(SpawnSpec { label: Some("x".repeat(257)), ..rig.spec() })
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Validation(_)));
}

#[tokio::test]
async fn spawn_rejects_missing_project_path() {
    let rig = Rig::new();
    let err = rig
        .runtime
        .spawn(SpawnSpec {
            project_path: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Validation(_)));
}

#[tokio::test]
async fn spawn_rejects_path_outside_configured_root() {
    let mut config = EngineConfig::default();
    let root = tempfile::tempdir().unwrap();
    config.project_root = Some(root.path().to_path_buf());
    let rig = Rig::with_config(config);

    // rig.project lives outside root.
    let err = rig.runtime.spawn(rig.spec()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Validation(_)));
}

#[tokio::test]
async fn spawn_rejects_unknown_backend() {
    let rig = Rig::new();
    let err = rig
        .runtime
        .spawn(SpawnSpec { backend: Some("cursor".into()), ..rig.spec() })
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::BackendNotFound(_)));
}

#[tokio::test]
async fn capacity_cap_rejects_the_next_spawn() {
    let mut config = EngineConfig::default();
    config.max_concurrent = 2;
    let rig = Rig::with_config(config);

    rig.runtime.spawn(rig.spec()).await.unwrap();
    rig.runtime.spawn(rig.spec()).await.unwrap();
    let err = rig.runtime.spawn(rig.spec()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Capacity(2)));
    assert_eq!(rig.runtime.state().lock().workers.len(), 2);
}

#[tokio::test]
async fn ralph_spawn_issues_token_and_writes_it_to_context() {
    let rig = Rig::new();
    let outcome = rig
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..rig.spec() })
        .await
        .unwrap();

    let token = outcome.worker.ralph_token.unwrap();
    assert_eq!(token.len(), 10);
    let contents = std::fs::read_to_string(rig.context_file()).unwrap();
    assert!(contents.contains(&token));
}

#[tokio::test]
async fn strategic_label_also_gets_a_token() {
    let rig = Rig::new();
    let outcome = rig
        .runtime
        .spawn(SpawnSpec { label: Some("GENERAL: campaign".into()), ..rig.spec() })
        .await
        .unwrap();
    assert!(outcome.worker.ralph_token.is_some());
}

#[tokio::test]
async fn plain_spawn_gets_no_token() {
    let rig = Rig::new();
    let outcome = rig.runtime.spawn(rig.spec()).await.unwrap();
    assert!(outcome.worker.ralph_token.is_none());
}

#[tokio::test]
async fn dependent_spawn_parks_in_pending() {
    let mut rig = Rig::new();
    let a = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let b = rig
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..rig.spec() })
        .await
        .unwrap();

    assert!(b.pending);
    assert_eq!(b.worker.status, WorkerStatus::Pending);
    rig.pump().await;

    let state = rig.runtime.state();
    let state = state.lock();
    assert!(state.pending.contains_key(b.worker.id.as_str()));
    assert!(!state.workers.contains_key(b.worker.id.as_str()));
    drop(state);
    assert!(!rig.fake.session_exists(&b.worker.session));
}

#[tokio::test]
async fn spawn_on_unknown_dependency_is_rejected() {
    let rig = Rig::new();
    let err = rig
        .runtime
        .spawn(SpawnSpec {
            depends_on: vec![fleet_core::WorkerId::new("ghost123")],
            ..rig.spec()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Dependency(_)));
}

#[tokio::test]
async fn init_prompt_fires_after_delay() {
    let mut rig = Rig::new();
    let outcome = rig
        .runtime
        .spawn(SpawnSpec {
            label: Some("TEST: prompt".into()),
            initial_input: Some("start with the README".into()),
            ..rig.spec()
        })
        .await
        .unwrap();
    rig.pump().await;

    // Nothing sent before the init delay.
    assert!(rig.fake.sent_literals(&outcome.worker.session).is_empty());

    rig.clock.advance(Duration::from_secs(3));
    rig.fire_timers().await;
    let sent = rig.fake.sent_literals(&outcome.worker.session);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("IDENTITY:"));
    assert!(sent[0].contains("TEST: prompt"));

    // Initial input follows one second later.
    rig.clock.advance(Duration::from_secs(1));
    rig.fire_timers().await;
    let sent = rig.fake.sent_literals(&outcome.worker.session);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], "start with the README");
}

#[tokio::test]
async fn spawn_then_kill_returns_registry_to_prior_size() {
    let mut rig = Rig::new();
    let before = rig.runtime.state().lock().workers.len();

    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;
    rig.runtime.kill(worker.id.as_str(), false).await.unwrap();
    rig.pump().await;

    let state = rig.runtime.state();
    let state = state.lock();
    assert_eq!(state.workers.len(), before);
    // The activity feed keeps the history.
    assert!(state.activity.len() >= 2);
}
