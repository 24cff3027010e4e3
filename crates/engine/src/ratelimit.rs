// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-caller token buckets on mutating operations.
//!
//! The capture path is never throttled; these buckets only guard the
//! control surface (spawn, kill, input, resize, settings).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("rate limit exceeded for {op}")]
pub struct RateLimited {
    pub op: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitedOp {
    Spawn,
    Kill,
    Input,
    RawInput,
    Resize,
    Settings,
}

impl LimitedOp {
    /// (burst capacity, refill window) per operation.
    fn limit(&self) -> (f64, Duration) {
        match self {
            LimitedOp::Spawn => (5.0, Duration::from_secs(60)),
            LimitedOp::Kill => (10.0, Duration::from_secs(60)),
            LimitedOp::Input => (30.0, Duration::from_secs(1)),
            LimitedOp::RawInput => (60.0, Duration::from_secs(1)),
            LimitedOp::Resize => (5.0, Duration::from_secs(1)),
            LimitedOp::Settings => (5.0, Duration::from_secs(1)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LimitedOp::Spawn => "spawn",
            LimitedOp::Kill => "kill",
            LimitedOp::Input => "input",
            LimitedOp::RawInput => "raw input",
            LimitedOp::Resize => "resize",
            LimitedOp::Settings => "settings",
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token buckets keyed by (caller, operation).
#[derive(Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<(String, LimitedOp), Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one token, refilling continuously at capacity/window.
    pub fn check(&self, caller: &str, op: LimitedOp, now: Instant) -> Result<(), RateLimited> {
        let (capacity, window) = op.limit();
        let rate_per_sec = capacity / window.as_secs_f64();

        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry((caller.to_string(), op))
            .or_insert_with(|| Bucket { tokens: capacity, last_refill: now });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate_per_sec).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(RateLimited { op: op.name() })
        }
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
