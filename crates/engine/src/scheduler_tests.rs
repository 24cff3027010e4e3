// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::WorkerId;

#[test]
fn timers_fire_once_at_deadline() {
    let mut scheduler = Scheduler::new();
    let now = Instant::now();
    let id = TimerId::init_prompt(&WorkerId::new("w1"));
    scheduler.set_timer(id.clone(), Duration::from_secs(3), now);

    assert!(scheduler.fired_timers(now + Duration::from_secs(2)).is_empty());

    let fired = scheduler.fired_timers(now + Duration::from_secs(3));
    assert_eq!(fired, vec![Event::TimerStart { id }]);
    assert!(scheduler.fired_timers(now + Duration::from_secs(10)).is_empty());
    assert!(!scheduler.has_timers());
}

#[test]
fn setting_same_id_resets_deadline() {
    let mut scheduler = Scheduler::new();
    let now = Instant::now();
    let id = TimerId::ralph_nudge(&WorkerId::new("w1"));
    scheduler.set_timer(id.clone(), Duration::from_secs(1), now);
    scheduler.set_timer(id, Duration::from_secs(60), now);
    assert!(scheduler.fired_timers(now + Duration::from_secs(30)).is_empty());
    assert!(scheduler.has_timers());
}

#[test]
fn cancel_worker_timers_clears_only_that_worker() {
    let mut scheduler = Scheduler::new();
    let now = Instant::now();
    let w1 = WorkerId::new("w1");
    let w2 = WorkerId::new("w2");
    scheduler.set_timer(TimerId::init_prompt(&w1), Duration::from_secs(3), now);
    scheduler.set_timer(TimerId::auto_cleanup(&w1), Duration::from_secs(30), now);
    scheduler.set_timer(TimerId::init_prompt(&w2), Duration::from_secs(3), now);

    scheduler.cancel_worker_timers("w1");

    let fired = scheduler.fired_timers(now + Duration::from_secs(60));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0], Event::TimerStart { id: TimerId::init_prompt(&w2) });
}

#[test]
fn fired_timers_sorted_for_determinism() {
    let mut scheduler = Scheduler::new();
    let now = Instant::now();
    scheduler.set_timer(TimerId::new("init-prompt:b"), Duration::ZERO, now);
    scheduler.set_timer(TimerId::new("init-prompt:a"), Duration::ZERO, now);
    let fired = scheduler.fired_timers(now + Duration::from_millis(1));
    let ids: Vec<String> = fired
        .iter()
        .map(|e| match e {
            Event::TimerStart { id } => id.to_string(),
            _ => String::new(),
        })
        .collect();
    assert_eq!(ids, vec!["init-prompt:a", "init-prompt:b"]);
}

#[test]
fn next_deadline_reports_earliest() {
    let mut scheduler = Scheduler::new();
    let now = Instant::now();
    assert!(scheduler.next_deadline().is_none());
    scheduler.set_timer(TimerId::new("init-prompt:a"), Duration::from_secs(5), now);
    scheduler.set_timer(TimerId::new("init-prompt:b"), Duration::from_secs(2), now);
    assert_eq!(scheduler.next_deadline(), Some(now + Duration::from_secs(2)));
}
