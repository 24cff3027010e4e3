// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: progress signalling over completion tokens.

use super::support::World;
use fleet_core::{RalphSignal, RalphStatus, SpawnSpec};
use fleet_engine::RuntimeError;
use std::time::Duration;

#[tokio::test]
async fn progress_then_done_consumes_the_token() {
    let mut world = World::new();
    let worker = world
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;
    let token = worker.ralph_token.unwrap();

    let record = world
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
    assert_eq!(record.ralph_status, Some(RalphStatus::InProgress));
    assert_eq!(record.ralph_progress, Some(30));
    assert_eq!(record.ralph_signaled_at_ms, None);

    let record = world
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
    assert_eq!(record.ralph_status, Some(RalphStatus::Done));
    assert!(record.ralph_signaled_at_ms.is_some());
    assert_eq!(record.ralph_outputs["k"], serde_json::json!("v"));

    let err = world
        .runtime
        .ralph_signal(&token, RalphSignal { status: "done".into(), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TokenNotFound));
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let mut world = World::new();
    let worker = world
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;
    let token = worker.ralph_token.unwrap();

    world.clock.advance(Duration::from_secs(4 * 60 * 60 + 1));
    let err = world
        .runtime
        .ralph_signal(
            &token,
            RalphSignal { status: "in_progress".into(), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TokenNotFound));
}

#[tokio::test]
async fn malformed_signal_fields_are_sanitized_not_fatal() {
    let mut world = World::new();
    let worker = world
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;
    let token = worker.ralph_token.unwrap();

    let record = world
        .runtime
        .ralph_signal(
            &token,
            RalphSignal {
                status: "victorious".into(),
                progress: Some(900.0),
                learnings: Some("x".repeat(100_000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(record.ralph_status, Some(RalphStatus::InProgress));
    assert_eq!(record.ralph_progress, Some(100));
    assert!(record.ralph_learnings.unwrap().len() <= 4096);
}

#[tokio::test]
async fn nudge_fires_only_for_silent_workers() {
    let mut world = World::new();
    let silent = world
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..world.spec() })
        .await
        .unwrap()
        .worker;
    let chatty = world
        .runtime
        .spawn(SpawnSpec { ralph_mode: true, ..world.spec() })
        .await
        .unwrap()
        .worker;
    world.pump().await;

    let chatty_token = chatty.ralph_token.clone().unwrap();
    world
        .runtime
        .ralph_signal(
            &chatty_token,
            RalphSignal { status: "in_progress".into(), ..Default::default() },
        )
        .await
        .unwrap();

    world.clock.advance(Duration::from_secs(61));
    world.fire_timers().await;

    let nudged = world.sessions.sent_literals(&silent.session);
    assert!(nudged.iter().any(|l| l.contains("Reminder")));
    let not_nudged = world.sessions.sent_literals(&chatty.session);
    assert!(not_nudged.iter().all(|l| !l.contains("Reminder")));
}
