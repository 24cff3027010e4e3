// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording, scriptable session adapter for tests.
//!
//! Tests drive the pane contents with `set_pane` and simulate session death
//! with `remove_session`; every adapter call is recorded for assertions.

use super::{validate_session_name, SessionAdapter, SessionError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Create { name: String, cwd: PathBuf, cols: u16, rows: u16, command: String },
    SendKeys { name: String, keys: String },
    SendLiteral { name: String, text: String },
    SendEnter { name: String },
    Capture { name: String },
    Kill { name: String },
    HasSession { name: String },
    ListSessions,
    CurrentCommand { name: String },
    Resize { name: String, cols: u16, rows: u16 },
}

#[derive(Debug, Default)]
struct FakeSession {
    pane: String,
    current_command: String,
    current_path: String,
}

#[derive(Default)]
struct FakeInner {
    calls: Vec<SessionCall>,
    sessions: HashMap<String, FakeSession>,
    /// When set, send/capture calls fail with `CommandFailed`.
    fail_io: bool,
}

/// Scriptable in-memory session adapter.
#[derive(Clone, Default)]
pub struct FakeSessionAdapter {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeSessionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the pane contents for a session.
    pub fn set_pane(&self, name: &str, text: &str) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(name) {
            session.pane = text.to_string();
        }
    }

    /// Script the pane's current command (for sentinel probes).
    pub fn set_current_command(&self, name: &str, command: &str) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(name) {
            session.current_command = command.to_string();
        }
    }

    /// Script the pane's working directory (for discovery tests).
    pub fn set_current_path(&self, name: &str, path: &str) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(name) {
            session.current_path = path.to_string();
        }
    }

    /// Simulate a session dying out from under the daemon.
    pub fn remove_session(&self, name: &str) {
        self.inner.lock().sessions.remove(name);
    }

    /// Pre-seed a session that the daemon did not create (discovery tests).
    pub fn add_session(&self, name: &str) {
        self.inner
            .lock()
            .sessions
            .insert(name.to_string(), FakeSession::default());
    }

    /// Make send/capture calls fail (circuit-breaker tests).
    pub fn set_fail_io(&self, fail: bool) {
        self.inner.lock().fail_io = fail;
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of Enter keystrokes recorded against a session.
    pub fn enter_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, SessionCall::SendEnter { name: n } if n == name))
            .count()
    }

    /// All literal text sent to a session, in order.
    pub fn sent_literals(&self, name: &str) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                SessionCall::SendLiteral { name: n, text } if n == name => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn session_exists(&self, name: &str) -> bool {
        self.inner.lock().sessions.contains_key(name)
    }

    fn record(&self, call: SessionCall) {
        self.inner.lock().calls.push(call);
    }

    fn io_guard(&self) -> Result<(), SessionError> {
        if self.inner.lock().fail_io {
            Err(SessionError::CommandFailed("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionAdapter for FakeSessionAdapter {
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        cols: u16,
        rows: u16,
        command: &str,
    ) -> Result<(), SessionError> {
        validate_session_name(name)?;
        self.record(SessionCall::Create {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
            cols,
            rows,
            command: command.to_string(),
        });
        let mut inner = self.inner.lock();
        if inner.sessions.contains_key(name) {
            return Err(SessionError::AlreadyExists(name.to_string()));
        }
        let current_command =
            command.split_whitespace().next().unwrap_or_default().to_string();
        inner.sessions.insert(
            name.to_string(),
            FakeSession {
                pane: String::new(),
                current_command,
                current_path: cwd.to_string_lossy().into_owned(),
            },
        );
        Ok(())
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<(), SessionError> {
        self.io_guard()?;
        self.record(SessionCall::SendKeys { name: name.to_string(), keys: keys.to_string() });
        if !self.session_exists(name) {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn send_literal(&self, name: &str, text: &str) -> Result<(), SessionError> {
        self.io_guard()?;
        self.record(SessionCall::SendLiteral { name: name.to_string(), text: text.to_string() });
        if !self.session_exists(name) {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn send_enter(&self, name: &str) -> Result<(), SessionError> {
        self.io_guard()?;
        self.record(SessionCall::SendEnter { name: name.to_string() });
        if !self.session_exists(name) {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn capture(&self, name: &str) -> Result<String, SessionError> {
        self.io_guard()?;
        self.record(SessionCall::Capture { name: name.to_string() });
        let inner = self.inner.lock();
        inner
            .sessions
            .get(name)
            .map(|s| s.pane.clone())
            .ok_or_else(|| SessionError::NotFound(name.to_string()))
    }

    async fn kill(&self, name: &str) -> Result<(), SessionError> {
        self.record(SessionCall::Kill { name: name.to_string() });
        self.inner.lock().sessions.remove(name);
        Ok(())
    }

    async fn has_session(&self, name: &str) -> Result<bool, SessionError> {
        self.record(SessionCall::HasSession { name: name.to_string() });
        Ok(self.session_exists(name))
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        self.record(SessionCall::ListSessions);
        let mut names: Vec<String> = self.inner.lock().sessions.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn current_command(&self, name: &str) -> Result<String, SessionError> {
        self.record(SessionCall::CurrentCommand { name: name.to_string() });
        let inner = self.inner.lock();
        inner
            .sessions
            .get(name)
            .map(|s| s.current_command.clone())
            .ok_or_else(|| SessionError::NotFound(name.to_string()))
    }

    async fn current_path(&self, name: &str) -> Result<String, SessionError> {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(name)
            .map(|s| s.current_path.clone())
            .ok_or_else(|| SessionError::NotFound(name.to_string()))
    }

    async fn resize(&self, name: &str, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.record(SessionCall::Resize { name: name.to_string(), cols, rows });
        if !self.session_exists(name) {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
