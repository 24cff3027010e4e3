// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: spawn, feed input, read output, kill.

use super::support::World;
use fleet_core::{SpawnSpec, WorkerStatus};
use fleet_engine::{EngineConfig, RuntimeError};
use std::time::Duration;

#[tokio::test]
async fn spawn_input_output_kill() {
    let mut world = World::new();
    let worker = world
        .runtime
        .spawn(SpawnSpec { label: Some("TEST: L".into()), ..world.spec() })
        .await
        .unwrap()
        .worker;
    assert_eq!(worker.status, WorkerStatus::Running);
    world.pump().await;

    // The caller feeds a command; the session echoes it back.
    world.runtime.send_input(worker.id.as_str(), "echo hi").await.unwrap();
    world.sessions.set_pane(&worker.session, "$ echo hi\nhi\n$ ");

    // Give the capture loop a few ticks to pick the pane up.
    tokio::time::sleep(Duration::from_millis(150)).await;
    world.pump().await;

    let output = world.runtime.worker_output(worker.id.as_str()).unwrap();
    assert!(output.contains("hi"));

    world.runtime.kill(worker.id.as_str(), false).await.unwrap();
    world.pump().await;

    assert!(world.runtime.get_worker(worker.id.as_str()).is_none());
    assert!(matches!(
        world.runtime.worker_output(worker.id.as_str()),
        Err(RuntimeError::WorkerNotFound(_))
    ));
}

#[tokio::test]
async fn capacity_cap_is_enforced() {
    let mut config = EngineConfig::default();
    config.max_concurrent = 2;
    let world = World::with_config(config);

    world.runtime.spawn(world.spec()).await.unwrap();
    world.runtime.spawn(world.spec()).await.unwrap();
    let err = world.runtime.spawn(world.spec()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Capacity(2)));
    assert_eq!(world.runtime.state().lock().workers.len(), 2);
}

#[tokio::test]
async fn auto_accept_fires_once_per_prompt_screen() {
    let mut world = World::new();
    let worker = world
        .runtime
        .spawn(SpawnSpec { auto_accept: true, ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;

    world
        .sessions
        .set_pane(&worker.session, "Do you want to proceed?\n❯ 1. Yes\n  2. No");
    // Several capture ticks, all well inside the 1.5 s re-arm window.
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(world.sessions.enter_count(&worker.session), 1);
}

#[tokio::test]
async fn pause_keyword_suppresses_auto_accept() {
    let mut world = World::new();
    let worker = world
        .runtime
        .spawn(SpawnSpec { auto_accept: true, ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;

    world.sessions.set_pane(
        &worker.session,
        "plan mode on\nDo you want to proceed? [Y/n]",
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    world.pump().await;

    assert_eq!(world.sessions.enter_count(&worker.session), 0);
    let record = world.runtime.get_worker(worker.id.as_str()).unwrap();
    assert!(record.auto_accept_paused);
}

#[tokio::test]
async fn vanished_session_is_detected_and_cleaned() {
    let mut world = World::new();
    let worker = world.runtime.spawn(world.spec()).await.unwrap().worker;
    world.pump().await;

    // Past the startup grace, the session disappears out from under us.
    world.clock.advance(Duration::from_secs(6));
    world.sessions.remove_session(&worker.session);

    tokio::time::sleep(Duration::from_millis(200)).await;
    world.pump().await;

    assert!(world.runtime.get_worker(worker.id.as_str()).is_none());
}
