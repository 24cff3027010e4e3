// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background checkpointing with zstd compression and durable fsync.
//!
//! The checkpoint sequence: serialize, compress, write to `.tmp`, fsync the
//! file, rename into place, fsync the directory. Only after all of that is
//! it safe to truncate the WAL, the invariant that makes truncation
//! crash-safe even across power loss.

use crate::snapshot::{Snapshot, CURRENT_SNAPSHOT_VERSION};
use crate::state::MaterializedState;
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use thiserror::Error;

/// zstd level 3: good speed/ratio balance for second-granularity checkpoints.
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compress(String),
    #[error("checkpoint failed: {0}")]
    Failed(String),
}

/// Result of a completed checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointResult {
    pub seq: u64,
    /// Compressed snapshot size on disk.
    pub size_bytes: u64,
}

/// Handle to a checkpoint running on a background thread.
pub struct CheckpointHandle {
    pub seq: u64,
    receiver: mpsc::Receiver<Result<CheckpointResult, CheckpointError>>,
}

impl CheckpointHandle {
    /// Block until the snapshot is fully durable (including the directory
    /// fsync). Only after this returns Ok may the WAL be truncated.
    pub fn wait(self) -> Result<CheckpointResult, CheckpointError> {
        self.receiver
            .recv()
            .map_err(|_| CheckpointError::Failed("checkpoint thread terminated".into()))?
    }
}

/// Manages snapshot writes.
pub struct Checkpointer {
    snapshot_path: PathBuf,
}

impl Checkpointer {
    pub fn new(snapshot_path: PathBuf) -> Self {
        Self { snapshot_path }
    }

    /// Start a background checkpoint from a state clone.
    pub fn start(&self, seq: u64, state: &MaterializedState) -> CheckpointHandle {
        let state = state.clone();
        let path = self.snapshot_path.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(write_checkpoint(seq, &state, &path));
        });
        CheckpointHandle { seq, receiver: rx }
    }

    /// Synchronous checkpoint, used at shutdown.
    pub fn checkpoint_sync(
        &self,
        seq: u64,
        state: &MaterializedState,
    ) -> Result<CheckpointResult, CheckpointError> {
        write_checkpoint(seq, state, &self.snapshot_path)
    }
}

fn write_checkpoint(
    seq: u64,
    state: &MaterializedState,
    snapshot_path: &Path,
) -> Result<CheckpointResult, CheckpointError> {
    let snapshot = Snapshot {
        version: CURRENT_SNAPSHOT_VERSION,
        seq,
        state: state.clone(),
        created_at: Utc::now(),
    };
    let json = serde_json::to_vec(&snapshot)?;
    let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
        .map_err(|e| CheckpointError::Compress(e.to_string()))?;

    if let Some(parent) = snapshot_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = snapshot_path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&compressed)?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, snapshot_path)?;
    // Directory fsync makes the rename durable across power loss
    if let Some(parent) = snapshot_path.parent() {
        File::open(parent)?.sync_all()?;
    }

    Ok(CheckpointResult { seq, size_bytes: compressed.len() as u64 })
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
