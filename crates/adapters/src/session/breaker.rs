// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker around multiplexer send/capture calls.
//!
//! When the multiplexer starts failing (dead server, resource exhaustion)
//! the engine must degrade instead of hammering it once per capture tick
//! per worker. Failures are counted over a sliding window; tripping
//! short-circuits further send/capture calls until a cool-down elapses.

use super::{SessionAdapter, SessionError};
use async_trait::async_trait;
use fleet_core::Clock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Sliding window over which failures are counted.
    pub window: Duration,
    /// Failures within the window that trip the breaker.
    pub max_failures: usize,
    /// How long tripped calls short-circuit.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            max_failures: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Point-in-time breaker state for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub tripped: bool,
    pub recent_failures: usize,
    pub cooldown_remaining_ms: u64,
}

#[derive(Default)]
struct BreakerInner {
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, inner: Mutex::new(BreakerInner::default()) }
    }

    /// Gate a call. Returns `CircuitOpen` while tripped; a cool-down that
    /// has elapsed closes the breaker and clears the window.
    pub fn check(&self, now: Instant) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if let Some(opened_at) = inner.opened_at {
            if now.duration_since(opened_at) < self.config.cooldown {
                return Err(SessionError::CircuitOpen);
            }
            inner.opened_at = None;
            inner.failures.clear();
            tracing::info!("circuit breaker closed after cooldown");
        }
        Ok(())
    }

    pub fn record_failure(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.failures.push_back(now);
        let horizon = now.checked_sub(self.config.window);
        while let Some(first) = inner.failures.front() {
            match horizon {
                Some(h) if *first < h => {
                    inner.failures.pop_front();
                }
                _ => break,
            }
        }
        if inner.opened_at.is_none() && inner.failures.len() >= self.config.max_failures {
            inner.opened_at = Some(now);
            tracing::warn!(
                failures = inner.failures.len(),
                window_s = self.config.window.as_secs(),
                "circuit breaker tripped"
            );
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.opened_at.is_none() {
            inner.failures.clear();
        }
    }

    pub fn snapshot(&self, now: Instant) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let cooldown_remaining_ms = inner
            .opened_at
            .map(|opened| {
                self.config
                    .cooldown
                    .saturating_sub(now.duration_since(opened))
                    .as_millis() as u64
            })
            .unwrap_or(0);
        BreakerSnapshot {
            tripped: inner.opened_at.is_some(),
            recent_failures: inner.failures.len(),
            cooldown_remaining_ms,
        }
    }
}

/// Session adapter wrapper applying the circuit breaker to send/capture.
///
/// Create/kill/has/list bypass the breaker: lifecycle calls are rare and
/// must keep working so cleanup can proceed while the breaker is open.
#[derive(Clone)]
pub struct GuardedSessions<S, C: Clock> {
    inner: S,
    breaker: Arc<CircuitBreaker>,
    clock: C,
}

impl<S: SessionAdapter, C: Clock> GuardedSessions<S, C> {
    pub fn new(inner: S, breaker: Arc<CircuitBreaker>, clock: C) -> Self {
        Self { inner, breaker, clock }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    fn settle<T>(&self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(e) if e.is_infrastructure() => self.breaker.record_failure(self.clock.now()),
            Err(_) => {}
        }
        result
    }
}

#[async_trait]
impl<S: SessionAdapter, C: Clock> SessionAdapter for GuardedSessions<S, C> {
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        cols: u16,
        rows: u16,
        command: &str,
    ) -> Result<(), SessionError> {
        self.inner.create(name, cwd, cols, rows, command).await
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<(), SessionError> {
        self.breaker.check(self.clock.now())?;
        let result = self.inner.send_keys(name, keys).await;
        self.settle(result)
    }

    async fn send_literal(&self, name: &str, text: &str) -> Result<(), SessionError> {
        self.breaker.check(self.clock.now())?;
        let result = self.inner.send_literal(name, text).await;
        self.settle(result)
    }

    async fn send_enter(&self, name: &str) -> Result<(), SessionError> {
        self.breaker.check(self.clock.now())?;
        let result = self.inner.send_enter(name).await;
        self.settle(result)
    }

    async fn capture(&self, name: &str) -> Result<String, SessionError> {
        self.breaker.check(self.clock.now())?;
        let result = self.inner.capture(name).await;
        self.settle(result)
    }

    async fn kill(&self, name: &str) -> Result<(), SessionError> {
        self.inner.kill(name).await
    }

    async fn has_session(&self, name: &str) -> Result<bool, SessionError> {
        self.inner.has_session(name).await
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        self.inner.list_sessions().await
    }

    async fn current_command(&self, name: &str) -> Result<String, SessionError> {
        self.inner.current_command(name).await
    }

    async fn current_path(&self, name: &str) -> Result<String, SessionError> {
        self.inner.current_path(name).await
    }

    async fn resize(&self, name: &str, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.inner.resize(name, cols, rows).await
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
