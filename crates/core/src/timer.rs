// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifiers.
//!
//! Timers carry their routing information in the id string so the timer
//! handler can dispatch a fired timer without auxiliary lookup tables.
//! Format: `<kind>:<worker-id>`.

use crate::id::WorkerId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a scheduled timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Self-awareness prompt, sent after the session settles.
    pub fn init_prompt(worker: &WorkerId) -> Self {
        Self(format!("init-prompt:{worker}"))
    }

    /// Caller-supplied initial input, sent after the init prompt.
    pub fn initial_input(worker: &WorkerId) -> Self {
        Self(format!("initial-input:{worker}"))
    }

    /// Reminder injected when a ralph worker hasn't signaled yet.
    pub fn ralph_nudge(worker: &WorkerId) -> Self {
        Self(format!("ralph-nudge:{worker}"))
    }

    /// Kill of a completed worker after the cleanup delay.
    pub fn auto_cleanup(worker: &WorkerId) -> Self {
        Self(format!("auto-cleanup:{worker}"))
    }

    /// Cleanup of a worker whose session died.
    pub fn dead_cleanup(worker: &WorkerId) -> Self {
        Self(format!("dead-cleanup:{worker}"))
    }

    /// Grace period before a worker is failed because a dependency failed.
    pub fn dep_grace(worker: &WorkerId) -> Self {
        Self(format!("dep-grace:{worker}"))
    }

    /// Parse this timer id into a typed kind.
    pub fn kind(&self) -> Option<TimerKind> {
        TimerKind::parse(&self.0)
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsed representation of a timer id for type-safe routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    InitPrompt(WorkerId),
    InitialInput(WorkerId),
    RalphNudge(WorkerId),
    AutoCleanup(WorkerId),
    DeadCleanup(WorkerId),
    DepGrace(WorkerId),
}

impl TimerKind {
    /// Parse a timer id string. Returns `None` for unrecognized formats.
    pub fn parse(id: &str) -> Option<Self> {
        let (kind, rest) = id.split_once(':')?;
        if rest.is_empty() {
            return None;
        }
        let worker = WorkerId::new(rest);
        match kind {
            "init-prompt" => Some(TimerKind::InitPrompt(worker)),
            "initial-input" => Some(TimerKind::InitialInput(worker)),
            "ralph-nudge" => Some(TimerKind::RalphNudge(worker)),
            "auto-cleanup" => Some(TimerKind::AutoCleanup(worker)),
            "dead-cleanup" => Some(TimerKind::DeadCleanup(worker)),
            "dep-grace" => Some(TimerKind::DepGrace(worker)),
            _ => None,
        }
    }

    /// The worker this timer belongs to.
    pub fn worker(&self) -> &WorkerId {
        match self {
            TimerKind::InitPrompt(w)
            | TimerKind::InitialInput(w)
            | TimerKind::RalphNudge(w)
            | TimerKind::AutoCleanup(w)
            | TimerKind::DeadCleanup(w)
            | TimerKind::DepGrace(w) => w,
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
