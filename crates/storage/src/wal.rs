// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event write-ahead log with group commit.
//!
//! Each entry is one line of JSON: `{"seq":N,"event":{...}}`. Appends are
//! buffered and flushed in batches (interval or size triggered) with a
//! single fsync, which is the durability point. A torn tail from a crash
//! is detected at open and truncated away; everything before it is kept.

use fleet_core::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit.
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum buffered entries before a flush is forced.
const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct RecordRef<'a> {
    seq: u64,
    event: &'a Event,
}

#[derive(Deserialize)]
struct Record {
    seq: u64,
    event: Event,
}

/// A single WAL entry with its sequence number.
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Result of scanning the log at open.
struct Scan {
    max_seq: u64,
    read_offset: u64,
    valid_len: u64,
}

/// Durable event log.
///
/// Tracks two positions: `write_seq` (highest appended sequence) and
/// `processed_seq` (highest sequence the engine has finished with; persisted
/// indirectly through snapshots).
pub struct Wal {
    file: File,
    path: PathBuf,
    write_seq: u64,
    processed_seq: u64,
    /// Byte offset of the first unprocessed entry.
    read_offset: u64,
    buffer: Vec<Vec<u8>>,
    last_flush: Instant,
}

impl Wal {
    /// Open or create a WAL. `processed_seq` comes from the snapshot
    /// (0 without one); the scan positions the read cursor just past it.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
        let scan = Self::scan(&file, processed_seq)?;

        let file_len = file.metadata()?.len();
        if scan.valid_len < file_len {
            warn!(
                path = %path.display(),
                valid = scan.valid_len,
                total = file_len,
                "truncating torn WAL tail"
            );
            file.set_len(scan.valid_len)?;
        }

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq: scan.max_seq,
            processed_seq,
            read_offset: scan.read_offset,
            buffer: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    /// Scan all entries, recording the highest sequence, the offset of the
    /// first entry past `processed_seq`, and the length of the valid prefix.
    fn scan(file: &File, processed_seq: u64) -> Result<Scan, WalError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut max_seq = 0u64;
        let mut read_offset: Option<u64> = None;
        let mut offset = 0u64;
        let mut line = String::new();

        loop {
            line.clear();
            let n = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            };

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                let record: Record = match serde_json::from_str(trimmed) {
                    Ok(r) => r,
                    // Torn tail: stop here, everything after is discarded
                    Err(_) => break,
                };
                max_seq = max_seq.max(record.seq);
                if record.seq > processed_seq && read_offset.is_none() {
                    read_offset = Some(offset);
                }
            }
            offset += n as u64;
        }

        Ok(Scan { max_seq, read_offset: read_offset.unwrap_or(offset), valid_len: offset })
    }

    /// Append an event to the write buffer and return its sequence number.
    /// Not durable until `flush`.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        self.write_seq += 1;
        let seq = self.write_seq;
        let bytes = serde_json::to_vec(&RecordRef { seq, event })?;
        self.buffer.push(bytes);
        Ok(seq)
    }

    /// Whether the group-commit conditions are met.
    pub fn needs_flush(&self) -> bool {
        !self.buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Flush buffered entries with a single fsync.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        for mut bytes in self.buffer.drain(..) {
            bytes.push(b'\n');
            self.file.write_all(&bytes)?;
        }
        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Read the next unprocessed entry, flushing pending writes first.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        self.flush()?;

        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(self.read_offset))?;

        let mut line = String::new();
        let n = match reader.read_line(&mut line) {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.read_offset += n as u64;
            return Ok(None);
        }

        match serde_json::from_str::<Record>(trimmed) {
            Ok(record) => {
                self.read_offset += n as u64;
                Ok(Some(WalEntry { seq: record.seq, event: record.event }))
            }
            Err(e) => {
                // Skip past a corrupt line rather than spinning on it
                warn!(offset = self.read_offset, error = %e, "skipping corrupt WAL entry");
                self.read_offset += n as u64;
                Ok(None)
            }
        }
    }

    /// Mark an entry processed (persisted via the next snapshot).
    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = seq;
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// All entries with sequence greater than `seq` (recovery replay).
    pub fn entries_after(&self, seq: u64) -> Result<Vec<WalEntry>, WalError> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut entries = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: Record = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => break,
            };
            if record.seq > seq {
                entries.push(WalEntry { seq: record.seq, event: record.event });
            }
        }
        Ok(entries)
    }

    /// Drop entries below `seq` after a checkpoint, reclaiming disk space.
    /// Rewrites the log atomically (tmp file + rename), keeping surviving
    /// lines byte-for-byte (no re-serialization).
    pub fn truncate_before(&mut self, seq: u64) -> Result<(), WalError> {
        self.flush()?;

        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut kept: Vec<(u64, String)> = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: Record = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => break,
            };
            if record.seq >= seq {
                kept.push((record.seq, trimmed.to_string()));
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        let mut new_read_offset = 0u64;
        let mut found_unprocessed = false;
        {
            let mut tmp = File::create(&tmp_path)?;
            let mut offset = 0u64;
            for (entry_seq, raw) in &kept {
                if *entry_seq > self.processed_seq && !found_unprocessed {
                    new_read_offset = offset;
                    found_unprocessed = true;
                }
                tmp.write_all(raw.as_bytes())?;
                tmp.write_all(b"\n")?;
                offset += raw.len() as u64 + 1;
            }
            if !found_unprocessed {
                new_read_offset = offset;
            }
            tmp.sync_all()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().create(true).read(true).append(true).open(&self.path)?;
        self.read_offset = new_read_offset;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
