// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn spawn_allows_five_per_minute() {
    let limiter = RateLimiter::new();
    let now = Instant::now();
    for _ in 0..5 {
        limiter.check("cli", LimitedOp::Spawn, now).unwrap();
    }
    assert!(limiter.check("cli", LimitedOp::Spawn, now).is_err());
}

#[test]
fn bucket_refills_over_time() {
    let limiter = RateLimiter::new();
    let now = Instant::now();
    for _ in 0..5 {
        limiter.check("cli", LimitedOp::Spawn, now).unwrap();
    }
    assert!(limiter.check("cli", LimitedOp::Spawn, now).is_err());
    // One spawn token refills every 12 s.
    assert!(limiter.check("cli", LimitedOp::Spawn, now + Duration::from_secs(13)).is_ok());
    assert!(limiter.check("cli", LimitedOp::Spawn, now + Duration::from_secs(13)).is_err());
}

#[test]
fn callers_have_independent_buckets() {
    let limiter = RateLimiter::new();
    let now = Instant::now();
    for _ in 0..5 {
        limiter.check("a", LimitedOp::Spawn, now).unwrap();
    }
    assert!(limiter.check("a", LimitedOp::Spawn, now).is_err());
    assert!(limiter.check("b", LimitedOp::Spawn, now).is_ok());
}

#[test]
fn operations_have_independent_buckets() {
    let limiter = RateLimiter::new();
    let now = Instant::now();
    for _ in 0..5 {
        limiter.check("cli", LimitedOp::Settings, now).unwrap();
    }
    assert!(limiter.check("cli", LimitedOp::Settings, now).is_err());
    assert!(limiter.check("cli", LimitedOp::Input, now).is_ok());
}

#[test]
fn raw_input_allows_higher_burst() {
    let limiter = RateLimiter::new();
    let now = Instant::now();
    for _ in 0..60 {
        limiter.check("cli", LimitedOp::RawInput, now).unwrap();
    }
    assert!(limiter.check("cli", LimitedOp::RawInput, now).is_err());
}
