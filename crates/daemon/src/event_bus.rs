// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL-backed event bus.
//!
//! Durable events are appended to the WAL before the engine loop processes
//! them, enabling crash recovery via snapshot + replay. Appends buffer in
//! memory and flush in ~10 ms batches.

use fleet_core::Event;
use fleet_storage::{Wal, WalEntry, WalError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sender half: appends to the WAL and wakes the engine loop.
#[derive(Clone)]
pub struct EventBus {
    wal: Arc<Mutex<Wal>>,
    wake_tx: mpsc::Sender<()>,
}

/// Reader half, owned by the engine loop.
pub struct EventReader {
    wal: Arc<Mutex<Wal>>,
    wake_rx: mpsc::Receiver<()>,
}

impl EventBus {
    pub fn new(wal: Wal) -> (Self, EventReader) {
        let wal = Arc::new(Mutex::new(wal));
        let (wake_tx, wake_rx) = mpsc::channel(1);
        (Self { wal: Arc::clone(&wal), wake_tx }, EventReader { wal, wake_rx })
    }

    /// Append an event (buffered; durable after the next flush).
    pub fn send(&self, event: Event) -> Result<u64, WalError> {
        let seq = self.wal.lock().append(&event)?;
        // Non-blocking wake: a full channel means the loop is already awake
        let _ = self.wake_tx.try_send(());
        Ok(seq)
    }

    /// Flush buffered events with one fsync (the durability point).
    pub fn flush(&self) -> Result<(), WalError> {
        self.wal.lock().flush()
    }

    pub fn needs_flush(&self) -> bool {
        self.wal.lock().needs_flush()
    }

    pub fn processed_seq(&self) -> u64 {
        self.wal.lock().processed_seq()
    }

    pub fn wal(&self) -> Arc<Mutex<Wal>> {
        Arc::clone(&self.wal)
    }
}

impl EventReader {
    /// Next unprocessed event, waiting for a wake when drained.
    /// `None` when every sender has dropped.
    pub async fn recv(&mut self) -> Result<Option<WalEntry>, WalError> {
        loop {
            {
                let mut wal = self.wal.lock();
                if let Some(entry) = wal.next_unprocessed()? {
                    return Ok(Some(entry));
                }
            }
            if self.wake_rx.recv().await.is_none() {
                return Ok(None);
            }
        }
    }

    pub fn mark_processed(&self, seq: u64) {
        self.wal.lock().mark_processed(seq);
    }

    pub fn wal(&self) -> Arc<Mutex<Wal>> {
        Arc::clone(&self.wal)
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
