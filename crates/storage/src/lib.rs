// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-storage: durable state for the fleet daemon.
//!
//! Events are appended to a JSONL write-ahead log before processing;
//! `MaterializedState` is derived by replaying them. Periodic checkpoints
//! compress the state into a snapshot so recovery is snapshot + short replay.
//! Worker terminal output lives in a separate append-only store keyed by
//! output session.

mod checkpoint;
mod output;
mod snapshot;
mod state;
mod wal;

pub use checkpoint::{CheckpointError, CheckpointHandle, CheckpointResult, Checkpointer};
pub use output::{ChunkKind, ChunkRow, OutputSessionRow, OutputStore, OutputStoreError};
pub use snapshot::{load_snapshot, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use wal::{Wal, WalEntry, WalError};
