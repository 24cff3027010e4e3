// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only worker output store.
//!
//! One output session spans a worker's lifetime; its chunks live in a
//! per-session JSONL file under `chunks/`, while `sessions.jsonl` carries
//! open/close rows replayed into an in-memory index at startup. Consecutive
//! chunks with the same content hash are discarded at append time.

use fleet_core::{chunk_hash, WorkerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Chunk retention, in days, for the daily sweep.
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

/// Sessions still "active" after this long are finalized by the sweep.
const ORPHAN_SESSION_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum OutputStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown output session: {0}")]
    UnknownSession(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Stdout,
    Stderr,
}

/// One output session: a worker's lifetime grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSessionRow {
    pub session_id: String,
    pub worker: WorkerId,
    pub label: String,
    pub project: String,
    pub working_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_status: Option<String>,
}

/// One captured chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRow {
    pub session_id: String,
    pub worker: WorkerId,
    pub at_ms: u64,
    pub content: String,
    pub kind: ChunkKind,
    pub hash: u64,
}

/// Rows of the sessions journal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum SessionOp {
    Open(OutputSessionRow),
    Close { session_id: String, ended_at_ms: u64, final_status: String },
}

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, OutputSessionRow>,
    /// session_id → hash of the most recent chunk (dedup gate).
    last_hash: HashMap<String, u64>,
    /// Worker → session ids, oldest first.
    by_worker: HashMap<WorkerId, Vec<String>>,
}

/// Append-only output store rooted at a directory.
pub struct OutputStore {
    dir: PathBuf,
    inner: Mutex<StoreInner>,
}

impl OutputStore {
    /// Open the store, replaying the sessions journal.
    pub fn open(dir: &Path) -> Result<Self, OutputStoreError> {
        std::fs::create_dir_all(dir.join("chunks"))?;
        let mut inner = StoreInner::default();

        let journal = dir.join("sessions.jsonl");
        if journal.exists() {
            let reader = BufReader::new(File::open(&journal)?);
            for line in reader.lines() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                // Unparseable rows are skipped, not fatal
                let Ok(op) = serde_json::from_str::<SessionOp>(trimmed) else {
                    continue;
                };
                match op {
                    SessionOp::Open(row) => {
                        inner
                            .by_worker
                            .entry(row.worker.clone())
                            .or_default()
                            .push(row.session_id.clone());
                        inner.sessions.insert(row.session_id.clone(), row);
                    }
                    SessionOp::Close { session_id, ended_at_ms, final_status } => {
                        if let Some(row) = inner.sessions.get_mut(&session_id) {
                            row.ended_at_ms = Some(ended_at_ms);
                            row.final_status = Some(final_status);
                        }
                    }
                }
            }
        }

        Ok(Self { dir: dir.to_path_buf(), inner: Mutex::new(inner) })
    }

    /// Open a new output session for a worker lifetime.
    pub fn open_session(&self, row: OutputSessionRow) -> Result<(), OutputStoreError> {
        {
            let mut inner = self.inner.lock();
            if inner.sessions.contains_key(&row.session_id) {
                return Ok(());
            }
            inner
                .by_worker
                .entry(row.worker.clone())
                .or_default()
                .push(row.session_id.clone());
            inner.sessions.insert(row.session_id.clone(), row.clone());
        }
        self.append_journal(&SessionOp::Open(row))
    }

    /// Finalize a session with a status label. Idempotent.
    pub fn finalize(
        &self,
        session_id: &str,
        final_status: &str,
        ended_at_ms: u64,
    ) -> Result<(), OutputStoreError> {
        {
            let mut inner = self.inner.lock();
            let Some(row) = inner.sessions.get_mut(session_id) else {
                return Err(OutputStoreError::UnknownSession(session_id.to_string()));
            };
            if row.ended_at_ms.is_some() {
                return Ok(());
            }
            row.ended_at_ms = Some(ended_at_ms);
            row.final_status = Some(final_status.to_string());
        }
        self.append_journal(&SessionOp::Close {
            session_id: session_id.to_string(),
            ended_at_ms,
            final_status: final_status.to_string(),
        })
    }

    /// Append a chunk, deduplicating against the previous chunk's hash.
    /// Returns `true` when the chunk was written.
    pub fn append_chunk(
        &self,
        session_id: &str,
        content: &str,
        kind: ChunkKind,
        at_ms: u64,
    ) -> Result<bool, OutputStoreError> {
        let hash = chunk_hash(content);
        let worker = {
            let mut inner = self.inner.lock();
            let Some(row) = inner.sessions.get(session_id) else {
                return Err(OutputStoreError::UnknownSession(session_id.to_string()));
            };
            let worker = row.worker.clone();
            if inner.last_hash.get(session_id) == Some(&hash) {
                return Ok(false);
            }
            inner.last_hash.insert(session_id.to_string(), hash);
            worker
        };

        let row = ChunkRow {
            session_id: session_id.to_string(),
            worker,
            at_ms,
            content: content.to_string(),
            kind,
            hash,
        };
        let mut bytes = serde_json::to_vec(&row)?;
        bytes.push(b'\n');
        let mut file =
            OpenOptions::new().create(true).append(true).open(self.chunk_path(session_id))?;
        file.write_all(&bytes)?;
        Ok(true)
    }

    /// Chunks of one session, paginated.
    pub fn session_chunks(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ChunkRow>, OutputStoreError> {
        Ok(self.read_chunks(session_id)?.into_iter().skip(offset).take(limit).collect())
    }

    /// Most recent chunks for a worker across its sessions, newest last.
    pub fn recent_chunks(
        &self,
        worker: &WorkerId,
        limit: usize,
    ) -> Result<Vec<ChunkRow>, OutputStoreError> {
        let session_ids = {
            let inner = self.inner.lock();
            inner.by_worker.get(worker).cloned().unwrap_or_default()
        };
        let mut chunks = Vec::new();
        for session_id in &session_ids {
            chunks.extend(self.read_chunks(session_id)?);
        }
        let skip = chunks.len().saturating_sub(limit);
        Ok(chunks.into_iter().skip(skip).collect())
    }

    /// Full concatenated output of one session.
    pub fn full_session_output(&self, session_id: &str) -> Result<String, OutputStoreError> {
        let chunks = self.read_chunks(session_id)?;
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&chunk.content);
        }
        Ok(out)
    }

    /// Session row by id.
    pub fn session(&self, session_id: &str) -> Option<OutputSessionRow> {
        self.inner.lock().sessions.get(session_id).cloned()
    }

    /// Sessions of one worker, oldest first.
    pub fn sessions_for(&self, worker: &WorkerId) -> Vec<OutputSessionRow> {
        let inner = self.inner.lock();
        inner
            .by_worker
            .get(worker)
            .map(|ids| ids.iter().filter_map(|id| inner.sessions.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Daily sweep: drop chunk files of sessions that ended before the
    /// retention horizon and finalize sessions left "active" past 24 h.
    /// Returns (files removed, sessions orphan-finalized).
    pub fn sweep(
        &self,
        now_ms: u64,
        retention_days: u64,
    ) -> Result<(usize, usize), OutputStoreError> {
        let horizon = now_ms.saturating_sub(retention_days * 24 * 60 * 60 * 1000);
        let mut removed = 0;
        let mut orphaned = 0;

        let (expired, stuck): (Vec<String>, Vec<String>) = {
            let inner = self.inner.lock();
            let expired = inner
                .sessions
                .values()
                .filter(|row| row.ended_at_ms.map(|end| end < horizon).unwrap_or(false))
                .map(|row| row.session_id.clone())
                .collect();
            let stuck = inner
                .sessions
                .values()
                .filter(|row| {
                    row.ended_at_ms.is_none()
                        && now_ms.saturating_sub(row.started_at_ms) > ORPHAN_SESSION_MS
                })
                .map(|row| row.session_id.clone())
                .collect();
            (expired, stuck)
        };

        for session_id in expired {
            let path = self.chunk_path(&session_id);
            if path.exists() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        for session_id in stuck {
            self.finalize(&session_id, "orphaned", now_ms)?;
            orphaned += 1;
        }
        Ok((removed, orphaned))
    }

    fn read_chunks(&self, session_id: &str) -> Result<Vec<ChunkRow>, OutputStoreError> {
        let path = self.chunk_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut chunks = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(row) = serde_json::from_str::<ChunkRow>(trimmed) {
                chunks.push(row);
            }
        }
        Ok(chunks)
    }

    fn chunk_path(&self, session_id: &str) -> PathBuf {
        self.dir.join("chunks").join(format!("{session_id}.jsonl"))
    }

    fn append_journal(&self, op: &SessionOp) -> Result<(), OutputStoreError> {
        let mut bytes = serde_json::to_vec(op)?;
        bytes.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("sessions.jsonl"))?;
        file.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
