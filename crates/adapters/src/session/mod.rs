// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session management adapters.

mod breaker;
mod noop;
mod tmux;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, GuardedSessions};
pub use noop::NoOpSessionAdapter;
pub use tmux::TmuxAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSessionAdapter, SessionCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session call timed out: {0}")]
    Timeout(String),
    #[error("session already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid session name: {0}")]
    InvalidName(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("circuit breaker open")]
    CircuitOpen,
}

impl SessionError {
    /// Failures that count against the circuit breaker. Validation errors
    /// and missing sessions reflect caller state, not multiplexer health.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout(_)
                | SessionError::SpawnFailed(_)
                | SessionError::CommandFailed(_)
        )
    }
}

/// Validate a session name against `^[A-Za-z0-9_-]+$`.
pub fn validate_session_name(name: &str) -> Result<(), SessionError> {
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(SessionError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Adapter for managing detached terminal sessions.
///
/// Implementations invoke the multiplexer with argv (never a shell string)
/// and bound every call with a timeout.
#[async_trait]
pub trait SessionAdapter: Clone + Send + Sync + 'static {
    /// Create a detached session running `command` in `cwd` with the given
    /// geometry.
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        cols: u16,
        rows: u16,
        command: &str,
    ) -> Result<(), SessionError>;

    /// Send a key sequence (multiplexer key names interpreted).
    async fn send_keys(&self, name: &str, keys: &str) -> Result<(), SessionError>;

    /// Send literal text (no key-name interpretation).
    async fn send_literal(&self, name: &str, text: &str) -> Result<(), SessionError>;

    /// Send the Enter key.
    async fn send_enter(&self, name: &str) -> Result<(), SessionError>;

    /// Capture the current pane contents, control sequences included.
    async fn capture(&self, name: &str) -> Result<String, SessionError>;

    /// Kill a session.
    async fn kill(&self, name: &str) -> Result<(), SessionError>;

    /// Check whether a session exists.
    async fn has_session(&self, name: &str) -> Result<bool, SessionError>;

    /// List all session names.
    async fn list_sessions(&self) -> Result<Vec<String>, SessionError>;

    /// The command currently running in the session's pane.
    async fn current_command(&self, name: &str) -> Result<String, SessionError>;

    /// The pane's current working directory (discovery/adoption).
    async fn current_path(&self, name: &str) -> Result<String, SessionError>;

    /// Resize the session's window.
    async fn resize(&self, name: &str, cols: u16, rows: u16) -> Result<(), SessionError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
