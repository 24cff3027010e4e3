// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet daemon library.
//!
//! Exposes the IPC protocol types for CLI clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod protocol;

pub use fleet_engine::PushFrame;
pub use protocol::{
    decode, encode, read_message, write_message, DaemonStatus, ProtocolError, Request, Response,
};
