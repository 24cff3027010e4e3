// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the runtime needs to perform.

use crate::event::Event;
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Effects executed by the runtime through the configured adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Emit an event into the system event bus.
    Emit { event: Event },

    // === Session effects ===
    /// Create a detached session running `command` in `cwd`.
    CreateSession { name: String, cwd: PathBuf, cols: u16, rows: u16, command: String },

    /// Send a key sequence (multiplexer key names interpreted).
    SendKeys { session: String, keys: String },

    /// Send literal text (no key-name interpretation), without Enter.
    SendLiteral { session: String, text: String },

    /// Send the Enter key.
    SendEnter { session: String },

    KillSession { session: String },

    ResizeSession { session: String, cols: u16, rows: u16 },

    // === Context file effects ===
    /// Write the per-project context file before spawn.
    WriteContextFile { path: PathBuf, contents: String },

    /// Remove the context file on kill.
    RemoveContextFile { path: PathBuf },

    // === Timer effects ===
    SetTimer {
        id: TimerId,
        #[serde(with = "duration_ms")]
        duration: Duration,
    },

    CancelTimer { id: TimerId },

    // === Notification effects ===
    /// POST an on-complete webhook.
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

impl Effect {
    /// Effect name for log spans.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::CreateSession { .. } => "create_session",
            Effect::SendKeys { .. } => "send_keys",
            Effect::SendLiteral { .. } => "send_literal",
            Effect::SendEnter { .. } => "send_enter",
            Effect::KillSession { .. } => "kill_session",
            Effect::ResizeSession { .. } => "resize_session",
            Effect::WriteContextFile { .. } => "write_context_file",
            Effect::RemoveContextFile { .. } => "remove_context_file",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
            Effect::Webhook { .. } => "webhook",
        }
    }

    /// Key-value pairs for structured logging.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::CreateSession { name, cwd, cols, rows, .. } => vec![
                ("session", name.clone()),
                ("cwd", cwd.display().to_string()),
                ("geometry", format!("{cols}x{rows}")),
            ],
            Effect::SendKeys { session, .. }
            | Effect::SendLiteral { session, .. }
            | Effect::SendEnter { session } => vec![("session", session.clone())],
            Effect::KillSession { session } => vec![("session", session.clone())],
            Effect::ResizeSession { session, cols, rows } => {
                vec![("session", session.clone()), ("geometry", format!("{cols}x{rows}"))]
            }
            Effect::WriteContextFile { path, .. } | Effect::RemoveContextFile { path } => {
                vec![("path", path.display().to_string())]
            }
            Effect::SetTimer { id, duration } => vec![
                ("timer", id.to_string()),
                ("duration_ms", duration.as_millis().to_string()),
            ],
            Effect::CancelTimer { id } => vec![("timer", id.to_string())],
            Effect::Webhook { url, .. } => vec![("url", url.clone())],
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
