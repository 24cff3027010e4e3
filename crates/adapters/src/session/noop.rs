// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op session adapter for environments without a multiplexer.

use super::{SessionAdapter, SessionError};
use async_trait::async_trait;
use std::path::Path;

#[derive(Clone, Default)]
pub struct NoOpSessionAdapter;

impl NoOpSessionAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionAdapter for NoOpSessionAdapter {
    async fn create(
        &self,
        _name: &str,
        _cwd: &Path,
        _cols: u16,
        _rows: u16,
        _command: &str,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_keys(&self, _name: &str, _keys: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_literal(&self, _name: &str, _text: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_enter(&self, _name: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn capture(&self, _name: &str) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn kill(&self, _name: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn has_session(&self, _name: &str) -> Result<bool, SessionError> {
        Ok(false)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        Ok(Vec::new())
    }

    async fn current_command(&self, _name: &str) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn current_path(&self, _name: &str) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn resize(&self, _name: &str, _cols: u16, _rows: u16) -> Result<(), SessionError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
