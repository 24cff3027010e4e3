// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::WorkerId;
use std::io::Write as _;

fn event(id: &str) -> Event {
    Event::WorkerDeleted { id: WorkerId::new(id) }
}

fn wal_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("wal").join("events.wal")
}

#[test]
fn append_assigns_increasing_seqs() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();
    assert_eq!(wal.append(&event("a")).unwrap(), 1);
    assert_eq!(wal.append(&event("b")).unwrap(), 2);
    assert_eq!(wal.write_seq(), 2);
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = wal_path(&dir);
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&event("a")).unwrap();
        wal.append(&event("b")).unwrap();
        wal.flush().unwrap();
    }
    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
}

#[test]
fn next_unprocessed_walks_entries_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();
    wal.append(&event("a")).unwrap();
    wal.append(&event("b")).unwrap();

    let first = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(first.seq, 1);
    wal.mark_processed(first.seq);

    let second = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(second.seq, 2);
    wal.mark_processed(second.seq);

    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn reopen_with_processed_seq_skips_old_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = wal_path(&dir);
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        for id in ["a", "b", "c"] {
            wal.append(&event(id)).unwrap();
        }
        wal.flush().unwrap();
    }
    let mut wal = Wal::open(&path, 2).unwrap();
    let next = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(next.seq, 3);
}

#[test]
fn torn_tail_is_truncated_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = wal_path(&dir);
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&event("a")).unwrap();
        wal.flush().unwrap();
    }
    // Simulate a torn write.
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\":2,\"event\":{\"type\":\"worker:del").unwrap();
    }
    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 1);
    // Appends continue past the truncated tail without corruption.
    wal.append(&event("b")).unwrap();
    wal.flush().unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn truncate_before_keeps_unprocessed_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();
    for id in ["a", "b", "c", "d"] {
        wal.append(&event(id)).unwrap();
    }
    wal.flush().unwrap();
    wal.mark_processed(2);

    wal.truncate_before(3).unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 3);

    // Read cursor still delivers the unprocessed tail.
    let next = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(next.seq, 3);
}

#[test]
fn needs_flush_after_interval_or_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();
    assert!(!wal.needs_flush());
    for _ in 0..100 {
        wal.append(&event("a")).unwrap();
    }
    assert!(wal.needs_flush());
    wal.flush().unwrap();
    assert!(!wal.needs_flush());
}
