// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("concurrent worker limit reached ({0})")]
    Capacity(usize),

    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("unknown or expired token")]
    TokenNotFound,

    #[error("unknown backend: {0}")]
    BackendNotFound(String),

    #[error("dependency error: {0}")]
    Dependency(#[from] crate::deps::DependencyError),

    #[error("session error: {0}")]
    Session(#[from] fleet_adapters::SessionError),

    #[error("execution error: {0}")]
    Execute(#[from] crate::executor::ExecuteError),

    #[error("storage error: {0}")]
    Storage(#[from] fleet_storage::OutputStoreError),
}

impl RuntimeError {
    /// Stable error kind for protocol responses.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Validation(_) => "validation",
            RuntimeError::Capacity(_) => "capacity",
            RuntimeError::WorkerNotFound(_) | RuntimeError::TokenNotFound => "not_found",
            RuntimeError::BackendNotFound(_) => "validation",
            RuntimeError::Dependency(_) => "validation",
            RuntimeError::Session(_) => "session",
            RuntimeError::Execute(_) | RuntimeError::Storage(_) => "internal",
        }
    }
}
