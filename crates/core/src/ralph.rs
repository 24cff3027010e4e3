// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ralph completion signalling.
//!
//! Workers report their own progress by POSTing a signal against a
//! short-lived completion token issued at spawn. Signals arrive from
//! untrusted terminal processes, so every field is sanitized before it
//! touches the registry: unknown statuses coerce to `in_progress`, numbers
//! clamp to range, oversized payloads truncate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Token lifetime: 4 hours.
pub const TOKEN_TTL_MS: u64 = 4 * 60 * 60 * 1000;

/// Length of a generated completion token.
const TOKEN_LEN: usize = 10;

/// Upper bound for free-text signal fields.
const MAX_TEXT_LEN: usize = 4096;

/// Upper bound for the outputs map.
const MAX_OUTPUTS: usize = 64;

/// Upper bound for the artifacts list.
const MAX_ARTIFACTS: usize = 128;

/// Generate a new completion token.
pub fn generate_token() -> String {
    nanoid::nanoid!(TOKEN_LEN)
}

/// Reported worker progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RalphStatus {
    Pending,
    InProgress,
    Done,
    Blocked,
}

impl RalphStatus {
    /// Terminal signals consume the completion token.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RalphStatus::Done | RalphStatus::Blocked)
    }
}

impl std::fmt::Display for RalphStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RalphStatus::Pending => write!(f, "pending"),
            RalphStatus::InProgress => write!(f, "in_progress"),
            RalphStatus::Done => write!(f, "done"),
            RalphStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// Raw signal body as received from a worker. Deliberately loose: parsing
/// never fails on weird-but-well-formed JSON, sanitation happens after.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RalphSignal {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learnings: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Sanitized signal, safe to merge into a worker record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RalphUpdate {
    pub status: RalphStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learnings: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RalphSignal {
    /// Sanitize the raw signal into a bounded, typed update.
    pub fn sanitize(self) -> RalphUpdate {
        let status = match self.status.as_str() {
            "pending" => RalphStatus::Pending,
            "done" => RalphStatus::Done,
            "blocked" => RalphStatus::Blocked,
            // Unknown statuses coerce to in_progress rather than erroring
            _ => RalphStatus::InProgress,
        };

        let progress = self.progress.map(|p| {
            if p.is_nan() {
                0
            } else {
                p.clamp(0.0, 100.0) as u8
            }
        });

        let mut outputs = self.outputs;
        if outputs.len() > MAX_OUTPUTS {
            let mut keys: Vec<String> = outputs.keys().cloned().collect();
            keys.sort();
            for key in keys.into_iter().skip(MAX_OUTPUTS) {
                outputs.remove(&key);
            }
        }

        let mut artifacts = self.artifacts;
        artifacts.truncate(MAX_ARTIFACTS);
        for path in &mut artifacts {
            truncate_in_place(path, MAX_TEXT_LEN);
        }

        RalphUpdate {
            status,
            progress,
            current_step: self.current_step.map(bounded),
            learnings: self.learnings.map(bounded),
            outputs,
            artifacts,
            reason: self.reason.map(bounded),
        }
    }
}

fn bounded(mut s: String) -> String {
    truncate_in_place(&mut s, MAX_TEXT_LEN);
    s
}

/// Truncate to a byte budget on a char boundary.
fn truncate_in_place(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[cfg(test)]
#[path = "ralph_tests.rs"]
mod tests;
