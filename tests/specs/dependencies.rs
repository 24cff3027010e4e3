// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: dependency-gated scheduling.

use super::support::World;
use fleet_core::{SpawnSpec, WorkerStatus};
use std::time::Duration;

#[tokio::test]
async fn dependent_waits_then_starts_on_completion() {
    let mut world = World::new();
    let a = world.runtime.spawn(world.spec()).await.unwrap().worker;
    let b = world
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..world.spec() })
        .await
        .unwrap();
    assert!(b.pending);
    let b = b.worker;
    world.pump().await;
    world.drain_push();

    let outcome = world.runtime.complete(a.id.as_str()).await.unwrap();
    assert_eq!(outcome.triggered, vec![b.id.clone()]);

    // Observed running before the next external query.
    let record = world.runtime.get_worker(b.id.as_str()).unwrap();
    assert_eq!(record.status, WorkerStatus::Running);
    assert!(world.sessions.session_exists(&b.session));

    world.pump().await;
    let frames = world.drain_push();
    assert!(frames
        .iter()
        .any(|f| f.event == "worker:dependencies_satisfied"
            && f.data["workerId"] == b.id.as_str()));
}

#[tokio::test]
async fn chain_of_three_starts_in_order() {
    let mut world = World::new();
    let a = world.runtime.spawn(world.spec()).await.unwrap().worker;
    let b = world
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..world.spec() })
        .await
        .unwrap()
        .worker;
    let c = world
        .runtime
        .spawn(SpawnSpec { depends_on: vec![b.id.clone()], ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;

    world.runtime.complete(a.id.as_str()).await.unwrap();
    world.pump().await;
    assert_eq!(
        world.runtime.get_worker(b.id.as_str()).unwrap().status,
        WorkerStatus::Running
    );
    // C still gated on B.
    assert_eq!(
        world.runtime.get_worker(c.id.as_str()).unwrap().status,
        WorkerStatus::Pending
    );

    world.runtime.complete(b.id.as_str()).await.unwrap();
    world.pump().await;
    assert_eq!(
        world.runtime.get_worker(c.id.as_str()).unwrap().status,
        WorkerStatus::Running
    );
}

#[tokio::test]
async fn failed_dependency_fails_waiter_after_grace() {
    let mut world = World::new();
    let a = world.runtime.spawn(world.spec()).await.unwrap().worker;
    let b = world
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;

    world.runtime.kill(a.id.as_str(), false).await.unwrap();
    world.pump().await;
    assert_eq!(
        world.runtime.get_worker(b.id.as_str()).unwrap().status,
        WorkerStatus::Pending
    );

    world.clock.advance(Duration::from_secs(61));
    world.fire_timers().await;
    assert!(world.runtime.get_worker(b.id.as_str()).is_none());

    // The failure shows up in the activity feed.
    let state = world.runtime.state();
    let state = state.lock();
    assert!(state
        .activity
        .entries()
        .any(|e| e.message.contains("dependency failed")));
}

#[tokio::test]
async fn spawn_carries_workflow_grouping() {
    let world = World::new();
    let a = world
        .runtime
        .spawn(SpawnSpec { workflow_id: Some("wf1".into()), ..world.spec() })
        .await
        .unwrap()
        .worker;
    assert_eq!(a.workflow_id.as_deref(), Some("wf1"));
}
