// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux session adapter.

use super::{validate_session_name, SessionAdapter, SessionError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Per-call timeout for every tmux invocation.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Scrollback lines included in a pane capture.
const CAPTURE_LINES: u32 = 200;

/// Tmux-based session adapter.
#[derive(Clone, Default)]
pub struct TmuxAdapter;

impl TmuxAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Run tmux with the given argv under the call timeout.
    async fn run(&self, args: &[&str]) -> Result<Output, SessionError> {
        let label = args.first().copied().unwrap_or("tmux");
        let fut = Command::new("tmux").args(args).output();
        match tokio::time::timeout(CALL_TIMEOUT, fut).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(SessionError::CommandFailed(format!("{label}: {e}"))),
            Err(_) => Err(SessionError::Timeout(label.to_string())),
        }
    }

    /// Classify a non-zero tmux exit from its stderr.
    fn classify(name: &str, stderr: &[u8]) -> SessionError {
        let text = String::from_utf8_lossy(stderr);
        let lowered = text.to_ascii_lowercase();
        if lowered.contains("duplicate session") {
            SessionError::AlreadyExists(name.to_string())
        } else if lowered.contains("can't find session")
            || lowered.contains("session not found")
            || lowered.contains("no server running")
            || lowered.contains("no current session")
        {
            SessionError::NotFound(name.to_string())
        } else {
            SessionError::CommandFailed(text.trim().to_string())
        }
    }
}

#[async_trait]
impl SessionAdapter for TmuxAdapter {
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        cols: u16,
        rows: u16,
        command: &str,
    ) -> Result<(), SessionError> {
        validate_session_name(name)?;
        if !cwd.is_dir() {
            return Err(SessionError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let cwd_str = cwd.display().to_string();
        let cols_str = cols.to_string();
        let rows_str = rows.to_string();
        let args = [
            "new-session",
            "-d",
            "-s",
            name,
            "-c",
            &cwd_str,
            "-x",
            &cols_str,
            "-y",
            &rows_str,
            command,
        ];
        let output = self.run(&args).await?;
        if !output.status.success() {
            let err = Self::classify(name, &output.stderr);
            tracing::error!(session = name, error = %err, "tmux spawn failed");
            return Err(match err {
                SessionError::AlreadyExists(n) => SessionError::AlreadyExists(n),
                SessionError::CommandFailed(msg) => SessionError::SpawnFailed(msg),
                other => other,
            });
        }

        // Non-fatal stderr may still carry useful warnings
        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session = name, stderr = %stderr, "tmux spawn stderr");
        }
        Ok(())
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<(), SessionError> {
        validate_session_name(name)?;
        let output = self.run(&["send-keys", "-t", name, keys]).await?;
        if !output.status.success() {
            return Err(Self::classify(name, &output.stderr));
        }
        Ok(())
    }

    async fn send_literal(&self, name: &str, text: &str) -> Result<(), SessionError> {
        validate_session_name(name)?;
        // -l = literal mode, -- = end of options (text may start with -)
        let output = self.run(&["send-keys", "-t", name, "-l", "--", text]).await?;
        if !output.status.success() {
            return Err(Self::classify(name, &output.stderr));
        }
        Ok(())
    }

    async fn send_enter(&self, name: &str) -> Result<(), SessionError> {
        self.send_keys(name, "Enter").await
    }

    async fn capture(&self, name: &str) -> Result<String, SessionError> {
        validate_session_name(name)?;
        let depth = format!("-{CAPTURE_LINES}");
        let output = self.run(&["capture-pane", "-t", name, "-p", "-e", "-S", &depth]).await?;
        if !output.status.success() {
            return Err(Self::classify(name, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn kill(&self, name: &str) -> Result<(), SessionError> {
        validate_session_name(name)?;
        let output = self.run(&["kill-session", "-t", name]).await?;
        if !output.status.success() {
            match Self::classify(name, &output.stderr) {
                // Already dead is fine for kill
                SessionError::NotFound(_) => {}
                other => return Err(other),
            }
        }
        Ok(())
    }

    async fn has_session(&self, name: &str) -> Result<bool, SessionError> {
        validate_session_name(name)?;
        let output = self.run(&["has-session", "-t", name]).await?;
        Ok(output.status.success())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        let output = self.run(&["list-sessions", "-F", "#{session_name}"]).await?;
        if !output.status.success() {
            // No server running means no sessions
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn current_command(&self, name: &str) -> Result<String, SessionError> {
        validate_session_name(name)?;
        let output =
            self.run(&["display-message", "-t", name, "-p", "#{pane_current_command}"]).await?;
        if !output.status.success() {
            return Err(Self::classify(name, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn current_path(&self, name: &str) -> Result<String, SessionError> {
        validate_session_name(name)?;
        let output =
            self.run(&["display-message", "-t", name, "-p", "#{pane_current_path}"]).await?;
        if !output.status.success() {
            return Err(Self::classify(name, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn resize(&self, name: &str, cols: u16, rows: u16) -> Result<(), SessionError> {
        validate_session_name(name)?;
        let cols_str = cols.to_string();
        let rows_str = rows.to_string();
        let output =
            self.run(&["resize-window", "-t", name, "-x", &cols_str, "-y", &rows_str]).await?;
        if !output.status.success() {
            return Err(Self::classify(name, &output.stderr));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
