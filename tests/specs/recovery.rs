// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: restart with live sessions.

use super::support::World;
use fleet_core::{SpawnSpec, WorkerStatus};
use fleet_engine::SentinelStatus;
use std::time::Duration;

#[tokio::test]
async fn restart_preserves_live_workers_and_reports_healthy() {
    let mut world = World::new();
    let first = world.runtime.spawn(world.spec()).await.unwrap().worker;
    let second = world.runtime.spawn(world.spec()).await.unwrap().worker;
    world.pump().await;

    let mut next = world.reincarnate();
    next.runtime.restore().await.unwrap();
    next.pump().await;

    for worker in [&first, &second] {
        let record = next.runtime.get_worker(worker.id.as_str()).unwrap();
        assert_eq!(record.status, WorkerStatus::Running);
    }

    // Output continues to flow into the new incarnation.
    next.sessions.set_pane(&first.session, "still alive");
    tokio::time::sleep(Duration::from_millis(150)).await;
    next.pump().await;
    let output = next.runtime.worker_output(first.id.as_str()).unwrap();
    assert!(output.contains("still alive"));

    let report = next.runtime.run_sentinel().await;
    assert_eq!(report.status, SentinelStatus::Healthy);
    assert_eq!(next.runtime.diagnostics().unwrap().at_ms, report.at_ms);
}

#[tokio::test]
async fn restart_drops_workers_whose_sessions_died() {
    let mut world = World::new();
    let casualty = world.runtime.spawn(world.spec()).await.unwrap().worker;
    let survivor = world.runtime.spawn(world.spec()).await.unwrap().worker;
    world.pump().await;

    world.sessions.remove_session(&casualty.session);

    let mut next = world.reincarnate();
    next.runtime.restore().await.unwrap();
    next.pump().await;

    assert!(next.runtime.get_worker(casualty.id.as_str()).is_none());
    assert!(next.runtime.get_worker(survivor.id.as_str()).is_some());
}

#[tokio::test]
async fn restart_keeps_pending_workers_gated() {
    let mut world = World::new();
    let a = world.runtime.spawn(world.spec()).await.unwrap().worker;
    let b = world
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;

    let mut next = world.reincarnate();
    next.runtime.restore().await.unwrap();
    next.pump().await;

    // Still gated after the restart...
    assert_eq!(
        next.runtime.get_worker(b.id.as_str()).unwrap().status,
        WorkerStatus::Pending
    );

    // ...and the chain still works.
    next.runtime.complete(a.id.as_str()).await.unwrap();
    next.pump().await;
    assert_eq!(
        next.runtime.get_worker(b.id.as_str()).unwrap().status,
        WorkerStatus::Running
    );
}
