// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-adapters: session and backend adapters.
//!
//! The session adapter wraps the terminal multiplexer behind a narrow,
//! validated surface; the backend trait captures what differs between
//! assistant CLIs (spawn command, context file, prompt-detection patterns).

pub mod backend;
pub mod session;

pub use backend::{Backend, BackendRegistry, ClaudeBackend};
pub use session::{
    validate_session_name, BreakerConfig, BreakerSnapshot, CircuitBreaker, GuardedSessions,
    NoOpSessionAdapter, SessionAdapter, SessionError, TmuxAdapter,
};

#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeSessionAdapter, SessionCall};
