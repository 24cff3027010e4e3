// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer and scheduling management.

use fleet_core::{Event, TimerId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Timer {
    fires_at: Instant,
}

/// Manages one-shot timers for the runtime. Fired timers become
/// `timer:start` events routed by their id.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or reset) a timer.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration, now: Instant) {
        self.timers.insert(id, Timer { fires_at: now + duration });
    }

    pub fn cancel_timer(&mut self, id: &TimerId) {
        self.timers.remove(id);
    }

    /// Cancel every timer belonging to a worker.
    pub fn cancel_worker_timers(&mut self, worker: &str) {
        self.timers.retain(|id, _| {
            id.kind().map(|k| k.worker().as_str() != worker).unwrap_or(true)
        });
    }

    /// Drain all timers that have fired.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<Event> {
        let mut fired: Vec<TimerId> = self
            .timers
            .iter()
            .filter(|(_, t)| t.fires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        // Deterministic dispatch order
        fired.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        fired
            .into_iter()
            .map(|id| {
                self.timers.remove(&id);
                Event::TimerStart { id }
            })
            .collect()
    }

    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.fires_at).min()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
