// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude CLI backend.

use super::Backend;
use std::time::Duration;

/// Seconds the CLI needs before injected keystrokes land reliably.
const INIT_DELAY: Duration = Duration::from_secs(3);

pub struct ClaudeBackend {
    command: String,
}

impl ClaudeBackend {
    /// `command` is the configured binary (plus flags), default `claude`.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self { command: if command.is_empty() { "claude".to_string() } else { command } }
    }
}

impl Default for ClaudeBackend {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl Backend for ClaudeBackend {
    fn name(&self) -> &str {
        "claude"
    }

    fn spawn_command(&self) -> String {
        self.command.clone()
    }

    fn context_file_name(&self) -> &str {
        "FLEET.md"
    }

    fn init_delay(&self) -> Duration {
        INIT_DELAY
    }

    fn accept_patterns(&self) -> Vec<String> {
        [
            r"\[Y/n\]",
            r"\[y/N\]",
            r"\(Y\)es",
            r"Do you want to (proceed|make this edit|create|overwrite|run|execute|allow)",
            r"Allow (this|once|always)",
            r"Yes.*to (allow|proceed|continue)",
            r"Press Enter to continue",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn pause_keywords(&self) -> Vec<String> {
        ["plan mode", "ExitPlanMode", "AskUserQuestion", "EnterPlanMode"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
