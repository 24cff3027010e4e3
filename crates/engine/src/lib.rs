// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-engine: the worker lifecycle and coordination engine.
//!
//! The `Runtime` owns the spawn/kill/complete paths, the dependency graph,
//! capture loops, auto-accept, Ralph tokens, health classification, and the
//! Sentinel diagnostics. Handlers turn events into further events plus
//! effects; the `Executor` performs effects through the session adapter.

pub mod auto_accept;
pub mod capture;
pub mod config;
pub mod context;
pub mod deps;
pub mod error;
pub mod executor;
pub mod push;
pub mod ralph;
pub mod ratelimit;
pub mod runtime;
pub mod scheduler;
pub mod sentinel;

pub use auto_accept::{AutoAccept, AutoAcceptAction, AutoAcceptState};
pub use capture::CaptureHub;
pub use config::EngineConfig;
pub use deps::{DependencyError, DependencyGraph, DependencyStats};
pub use error::RuntimeError;
pub use executor::{ExecuteError, Executor};
pub use push::PushFrame;
pub use ralph::{ChildStatus, ChildrenRollup, ChildrenSummary, TokenRegistry};
pub use ratelimit::{LimitedOp, RateLimiter};
pub use runtime::{CompleteOutcome, Runtime, RuntimeDeps, SpawnOutcome};
pub use scheduler::Scheduler;
pub use sentinel::{Sentinel, SentinelReport, SentinelStatus};
