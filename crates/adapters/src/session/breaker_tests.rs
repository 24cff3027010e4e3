// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::session::FakeSessionAdapter;
use fleet_core::FakeClock;

fn fast_config() -> BreakerConfig {
    BreakerConfig {
        window: Duration::from_secs(10),
        max_failures: 3,
        cooldown: Duration::from_secs(30),
    }
}

#[test]
fn trips_after_max_failures_in_window() {
    let breaker = CircuitBreaker::new(fast_config());
    let t0 = Instant::now();
    breaker.record_failure(t0);
    breaker.record_failure(t0 + Duration::from_secs(1));
    assert!(breaker.check(t0 + Duration::from_secs(2)).is_ok());
    breaker.record_failure(t0 + Duration::from_secs(2));
    assert!(matches!(
        breaker.check(t0 + Duration::from_secs(3)),
        Err(SessionError::CircuitOpen)
    ));
}

#[test]
fn old_failures_age_out_of_window() {
    let breaker = CircuitBreaker::new(fast_config());
    let t0 = Instant::now();
    breaker.record_failure(t0);
    breaker.record_failure(t0 + Duration::from_secs(1));
    // Third failure lands after the first has aged out.
    breaker.record_failure(t0 + Duration::from_secs(15));
    assert!(breaker.check(t0 + Duration::from_secs(16)).is_ok());
}

#[test]
fn closes_after_cooldown() {
    let breaker = CircuitBreaker::new(fast_config());
    let t0 = Instant::now();
    for i in 0..3 {
        breaker.record_failure(t0 + Duration::from_secs(i));
    }
    assert!(breaker.check(t0 + Duration::from_secs(5)).is_err());
    // Cooldown elapsed: breaker closes and the window resets.
    assert!(breaker.check(t0 + Duration::from_secs(40)).is_ok());
    let snap = breaker.snapshot(t0 + Duration::from_secs(40));
    assert!(!snap.tripped);
    assert_eq!(snap.recent_failures, 0);
}

#[test]
fn success_clears_closed_window() {
    let breaker = CircuitBreaker::new(fast_config());
    let t0 = Instant::now();
    breaker.record_failure(t0);
    breaker.record_failure(t0);
    breaker.record_success();
    breaker.record_failure(t0 + Duration::from_secs(1));
    assert!(breaker.check(t0 + Duration::from_secs(2)).is_ok());
}

#[test]
fn snapshot_reports_cooldown_remaining() {
    let breaker = CircuitBreaker::new(fast_config());
    let t0 = Instant::now();
    for _ in 0..3 {
        breaker.record_failure(t0);
    }
    let snap = breaker.snapshot(t0 + Duration::from_secs(10));
    assert!(snap.tripped);
    assert_eq!(snap.cooldown_remaining_ms, 20_000);
}

#[tokio::test]
async fn guarded_sessions_short_circuit_send_and_capture() {
    let fake = FakeSessionAdapter::new();
    fake.create("fleet-a", std::path::Path::new("/p"), 120, 40, "x").await.unwrap();
    fake.set_fail_io(true);

    let clock = FakeClock::new();
    let breaker = Arc::new(CircuitBreaker::new(fast_config()));
    let guarded = GuardedSessions::new(fake.clone(), breaker, clock.clone());

    for _ in 0..3 {
        assert!(guarded.capture("fleet-a").await.is_err());
    }
    // Breaker now open: the fake stops seeing calls.
    let calls_before = fake.calls().len();
    assert!(matches!(
        guarded.capture("fleet-a").await.unwrap_err(),
        SessionError::CircuitOpen
    ));
    assert_eq!(fake.calls().len(), calls_before);

    // Lifecycle calls bypass the breaker.
    assert!(guarded.has_session("fleet-a").await.unwrap());

    // After cooldown the breaker closes again.
    fake.set_fail_io(false);
    clock.advance(Duration::from_secs(31));
    assert!(guarded.capture("fleet-a").await.is_ok());
}

#[tokio::test]
async fn not_found_does_not_trip_breaker() {
    let fake = FakeSessionAdapter::new();
    let clock = FakeClock::new();
    let breaker = Arc::new(CircuitBreaker::new(fast_config()));
    let guarded = GuardedSessions::new(fake, breaker.clone(), clock.clone());

    for _ in 0..5 {
        assert!(matches!(
            guarded.capture("fleet-missing").await.unwrap_err(),
            SessionError::NotFound(_)
        ));
    }
    assert!(!breaker.snapshot(clock.now()).tripped);
}
