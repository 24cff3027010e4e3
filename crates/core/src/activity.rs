// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only activity feed.

use crate::id::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum retained entries.
const CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    WorkerStarted,
    WorkerPending,
    WorkerStopped,
    WorkerCompleted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: u64,
    pub at_ms: u64,
    pub kind: ActivityKind,
    pub worker: WorkerId,
    pub label: String,
    pub project: String,
    pub message: String,
}

/// Bounded ring of recent activity entries, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    next_id: u64,
}

impl ActivityLog {
    pub fn push(
        &mut self,
        at_ms: u64,
        kind: ActivityKind,
        worker: WorkerId,
        label: impl Into<String>,
        project: impl Into<String>,
        message: impl Into<String>,
    ) -> ActivityEntry {
        self.next_id += 1;
        let entry = ActivityEntry {
            id: self.next_id,
            at_ms,
            kind,
            worker,
            label: label.into(),
            project: project.into(),
            message: message.into(),
        };
        self.entries.push_back(entry.clone());
        while self.entries.len() > CAPACITY {
            self.entries.pop_front();
        }
        entry
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
