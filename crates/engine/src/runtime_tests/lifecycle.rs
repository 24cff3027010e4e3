// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::RuntimeError;
use fleet_core::{Clock, OnComplete, RalphSignal, RalphStatus, WorkerHealth};

#[tokio::test]
async fn complete_promotes_dependent_within_one_turn() {
    let mut rig = Rig::new();
    let a = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let b = rig
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;
    rig.drain_push();

    let outcome = rig.runtime.complete(a.id.as_str()).await.unwrap();
    assert_eq!(outcome.triggered, vec![b.id.clone()]);
    assert_eq!(outcome.worker.status, WorkerStatus::Completed);

    // B is running with a live session before any further pumping.
    assert_eq!(rig.status_of(b.id.as_str()), Some(WorkerStatus::Running));
    assert!(rig.fake.session_exists(&b.session));

    rig.pump().await;
    let frames = rig.drain_push();
    assert!(frames
        .iter()
        .any(|f| f.event == "worker:dependencies_satisfied"
            && f.data["workerId"] == b.id.as_str()));
    assert!(frames.iter().any(|f| f.event == "dependencies:triggered"));
}

#[tokio::test]
async fn double_complete_replays_the_same_triggered_set() {
    let mut rig = Rig::new();
    let a = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let _b = rig
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;

    let first = rig.runtime.complete(a.id.as_str()).await.unwrap();
    rig.pump().await;
    let second = rig.runtime.complete(a.id.as_str()).await.unwrap();

    assert_eq!(first.triggered, second.triggered);
    assert_eq!(second.worker.completed_at_ms, first.worker.completed_at_ms);
}

#[tokio::test]
async fn kill_tears_down_session_and_registry_entry() {
    let mut rig = Rig::new();
    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;
    assert!(rig.context_file().exists());

    rig.runtime.kill(worker.id.as_str(), false).await.unwrap();
    rig.pump().await;

    assert!(rig.runtime.get_worker(worker.id.as_str()).is_none());
    assert!(!rig.fake.session_exists(&worker.session));
    assert!(!rig.context_file().exists());

    // Second kill: not found.
    let err = rig.runtime.kill(worker.id.as_str(), false).await.unwrap_err();
    assert!(matches!(err, RuntimeError::WorkerNotFound(_)));
}

#[tokio::test]
async fn kill_of_pending_worker_needs_no_session() {
    let mut rig = Rig::new();
    let a = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let b = rig
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;

    rig.runtime.kill(b.id.as_str(), false).await.unwrap();
    rig.pump().await;
    assert!(rig.runtime.get_worker(b.id.as_str()).is_none());
}

#[tokio::test]
async fn killed_dependency_fails_dependent_after_grace() {
    let mut rig = Rig::new();
    let a = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let b = rig
        .runtime
        .spawn(SpawnSpec { depends_on: vec![a.id.clone()], ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;

    // A dies without completing.
    rig.runtime.kill(a.id.as_str(), false).await.unwrap();
    rig.pump().await;

    // B survives the grace window...
    assert_eq!(rig.status_of(b.id.as_str()), Some(WorkerStatus::Pending));

    // ...then fails by policy.
    rig.clock.advance(Duration::from_secs(61));
    rig.fire_timers().await;
    assert!(rig.runtime.get_worker(b.id.as_str()).is_none());
}

#[tokio::test]
async fn auto_cleanup_kills_completed_worker_after_delay() {
    let mut rig = Rig::new();
    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;

    rig.runtime.complete(worker.id.as_str()).await.unwrap();
    rig.pump().await;
    assert_eq!(rig.status_of(worker.id.as_str()), Some(WorkerStatus::Completed));

    rig.clock.advance(Duration::from_secs(31));
    rig.fire_timers().await;
    assert!(rig.runtime.get_worker(worker.id.as_str()).is_none());
}

#[tokio::test]
async fn keep_alive_opts_out_of_auto_cleanup() {
    let mut rig = Rig::new();
    let worker = rig
        .runtime
        .spawn(SpawnSpec { keep_alive: true, ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;

    rig.runtime.complete(worker.id.as_str()).await.unwrap();
    rig.pump().await;
    rig.clock.advance(Duration::from_secs(120));
    rig.fire_timers().await;

    assert_eq!(rig.status_of(worker.id.as_str()), Some(WorkerStatus::Completed));
}

#[tokio::test]
async fn on_complete_spawn_starts_follow_up_worker() {
    let mut rig = Rig::new();
    let follow_up = SpawnSpec { label: Some("follow-up".into()), ..rig.spec() };
    let worker = rig
        .runtime
        .spawn(SpawnSpec {
            on_complete: Some(OnComplete::Spawn { options: Box::new(follow_up) }),
            ..rig.spec()
        })
        .await
        .unwrap()
        .worker;
    rig.pump().await;

    rig.runtime.complete(worker.id.as_str()).await.unwrap();
    rig.pump().await;

    let state = rig.runtime.state();
    let state = state.lock();
    assert!(state.workers.values().any(|w| w.label == "follow-up"));
}

#[tokio::test]
async fn on_complete_emit_publishes_custom_frame() {
    let mut rig = Rig::new();
    let worker = rig
        .runtime
        .spawn(SpawnSpec {
            on_complete: Some(OnComplete::Emit {
                event: "pipeline:stage-done".into(),
                data: Some(serde_json::json!({ "stage": 1 })),
            }),
            ..rig.spec()
        })
        .await
        .unwrap()
        .worker;
    rig.pump().await;
    rig.drain_push();

    rig.runtime.complete(worker.id.as_str()).await.unwrap();
    rig.pump().await;

    let frames = rig.drain_push();
    assert!(frames
        .iter()
        .any(|f| f.event == "pipeline:stage-done" && f.data["stage"] == 1));
}

#[tokio::test]
async fn health_tick_marks_dead_and_schedules_cleanup() {
    let mut rig = Rig::new();
    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;

    rig.clock.advance(Duration::from_secs(6)); // past spawn grace
    rig.fake.remove_session(&worker.session);
    rig.runtime.run_health_tick().await.unwrap();
    rig.pump().await;

    let record = rig.runtime.get_worker(worker.id.as_str()).unwrap();
    assert_eq!(record.health, WorkerHealth::Dead);
    assert_eq!(record.status, WorkerStatus::Error);

    rig.clock.advance(Duration::from_secs(31));
    rig.fire_timers().await;
    assert!(rig.runtime.get_worker(worker.id.as_str()).is_none());
}

#[tokio::test]
async fn health_tick_marks_stalled_then_recovers() {
    let mut rig = Rig::new();
    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;

    rig.clock.advance(Duration::from_secs(6 * 60));
    rig.runtime.run_health_tick().await.unwrap();
    rig.pump().await;
    assert_eq!(
        rig.runtime.get_worker(worker.id.as_str()).unwrap().health,
        WorkerHealth::Stalled
    );

    // Fresh output heals it.
    rig.runtime
        .state()
        .lock()
        .apply_event(&Event::OutputObserved {
            id: worker.id.clone(),
            at_ms: rig.clock.epoch_ms(),
        });
    rig.runtime.run_health_tick().await.unwrap();
    rig.pump().await;
    assert_eq!(
        rig.runtime.get_worker(worker.id.as_str()).unwrap().health,
        WorkerHealth::Healthy
    );
}

#[tokio::test]
async fn ralph_signal_merges_then_terminal_consumes_token() {
    let mut rig = Rig::new();
    let worker = rig
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..rig.spec() })
        .await
        .unwrap()
        .worker;
    rig.pump().await;
    let token = worker.ralph_token.clone().unwrap();

    let updated = rig
        .runtime
        .ralph_signal(
            &token,
            RalphSignal {
                status: "in_progress".into(),
                progress: Some(30.0),
                current_step: Some("Running tests".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.ralph_status, Some(RalphStatus::InProgress));
    assert_eq!(updated.ralph_progress, Some(30));
    assert_eq!(updated.ralph_current_step.as_deref(), Some("Running tests"));
    assert_eq!(updated.ralph_signaled_at_ms, None);

    let done = rig
        .runtime
        .ralph_signal(
            &token,
            RalphSignal {
                status: "done".into(),
                learnings: Some("ok".into()),
                outputs: [("k".to_string(), serde_json::json!("v"))].into_iter().collect(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(done.ralph_status, Some(RalphStatus::Done));
    assert!(done.ralph_signaled_at_ms.is_some());
    assert_eq!(done.ralph_learnings.as_deref(), Some("ok"));

    // Token consumed: the next signal is rejected.
    let err = rig
        .runtime
        .ralph_signal(&token, RalphSignal { status: "done".into(), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TokenNotFound));
}

#[tokio::test]
async fn child_signal_notifies_parent_scope() {
    let mut rig = Rig::new();
    let parent = rig
        .runtime
        .spawn(SpawnSpec { label: Some("GENERAL: lead".into()), ..rig.spec() })
        .await
        .unwrap()
        .worker;
    let child = rig
        .runtime
        .spawn(SpawnSpec {
            ralph_mode: true,
            parent: Some(parent.id.clone()),
            parent_label: Some(parent.label.clone()),
            ..rig.spec()
        })
        .await
        .unwrap()
        .worker;
    rig.pump().await;
    rig.drain_push();

    let token = child.ralph_token.clone().unwrap();
    rig.runtime
        .ralph_signal(&token, RalphSignal { status: "done".into(), ..Default::default() })
        .await
        .unwrap();
    rig.pump().await;

    let frames = rig.drain_push();
    assert!(frames.iter().any(|f| f.event == "worker:ralph:signaled"));
    assert!(frames.iter().any(|f| {
        f.event == "worker:child:signaled"
            && f.data["parentWorkerId"] == parent.id.as_str()
            && f.data["workerId"] == child.id.as_str()
    }));
}

#[tokio::test]
async fn children_rollup_counts_states() {
    let mut rig = Rig::new();
    let parent = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let mut tokens = Vec::new();
    for _ in 0..3 {
        let child = rig
            .runtime
            .spawn(SpawnSpec {
                ralph_mode: true,
                parent: Some(parent.id.clone()),
                ..rig.spec()
            })
            .await
            .unwrap()
            .worker;
        tokens.push(child.ralph_token.unwrap());
    }
    rig.pump().await;

    rig.runtime
        .ralph_signal(&tokens[0], RalphSignal { status: "done".into(), ..Default::default() })
        .await
        .unwrap();
    rig.runtime
        .ralph_signal(
            &tokens[1],
            RalphSignal { status: "in_progress".into(), ..Default::default() },
        )
        .await
        .unwrap();
    rig.pump().await;

    let rollup = rig.runtime.children_rollup(parent.id.as_str()).unwrap();
    assert_eq!(rollup.summary.total, 3);
    assert_eq!(rollup.summary.done, 1);
    assert_eq!(rollup.summary.in_progress, 1);
    assert_eq!(rollup.summary.pending, 1);
}

#[tokio::test]
async fn settings_require_at_least_one_field() {
    let rig = Rig::new();
    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    let err = rig
        .runtime
        .update_settings(worker.id.as_str(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Validation(_)));

    let updated = rig
        .runtime
        .update_settings(worker.id.as_str(), Some(true), None)
        .await
        .unwrap();
    assert!(updated.auto_accept);
}

#[tokio::test]
async fn input_reaches_session_and_counts() {
    let mut rig = Rig::new();
    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;

    rig.runtime.send_input(worker.id.as_str(), "echo hi").await.unwrap();
    rig.pump().await;

    assert_eq!(rig.fake.sent_literals(&worker.session), vec!["echo hi".to_string()]);
    assert_eq!(rig.fake.enter_count(&worker.session), 1);
    assert_eq!(
        rig.runtime.get_worker(worker.id.as_str()).unwrap().queued_commands,
        1
    );
}

#[tokio::test]
async fn input_to_missing_worker_is_not_found() {
    let rig = Rig::new();
    let err = rig.runtime.send_input("ghost123", "hi").await.unwrap_err();
    assert!(matches!(err, RuntimeError::WorkerNotFound(_)));
}

#[tokio::test]
async fn cleanup_tick_reaps_forgotten_completed_workers() {
    let mut rig = Rig::new();
    let worker = rig.runtime.spawn(rig.spec()).await.unwrap().worker;
    rig.pump().await;
    rig.runtime.complete(worker.id.as_str()).await.unwrap();
    rig.pump().await;

    // Pretend the per-worker timer was lost (crash); the periodic tick
    // still reaps it.
    rig.runtime.scheduler().lock().cancel_worker_timers(worker.id.as_str());
    rig.clock.advance(Duration::from_secs(40));
    rig.runtime.run_cleanup_tick().await.unwrap();
    rig.pump().await;

    assert!(rig.runtime.get_worker(worker.id.as_str()).is_none());
}
