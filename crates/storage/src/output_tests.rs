// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn session_row(session_id: &str, worker: &str, started_at_ms: u64) -> OutputSessionRow {
    OutputSessionRow {
        session_id: session_id.to_string(),
        worker: WorkerId::new(worker),
        label: "TEST".into(),
        project: "acme".into(),
        working_dir: PathBuf::from("/proj/acme"),
        task_description: None,
        started_at_ms,
        ended_at_ms: None,
        final_status: None,
    }
}

#[test]
fn append_and_read_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::open(dir.path()).unwrap();
    store.open_session(session_row("s1", "w1", 1000)).unwrap();

    assert!(store.append_chunk("s1", "line one\n", ChunkKind::Stdout, 1001).unwrap());
    assert!(store.append_chunk("s1", "line two\n", ChunkKind::Stdout, 1002).unwrap());

    let chunks = store.session_chunks("s1", 0, 10).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "line one\n");
    assert_eq!(store.full_session_output("s1").unwrap(), "line one\nline two\n");
}

#[test]
fn consecutive_identical_chunks_are_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::open(dir.path()).unwrap();
    store.open_session(session_row("s1", "w1", 1000)).unwrap();

    assert!(store.append_chunk("s1", "same", ChunkKind::Stdout, 1).unwrap());
    assert!(!store.append_chunk("s1", "same", ChunkKind::Stdout, 2).unwrap());
    assert!(store.append_chunk("s1", "different", ChunkKind::Stdout, 3).unwrap());
    // Non-consecutive repeat is kept.
    assert!(store.append_chunk("s1", "same", ChunkKind::Stdout, 4).unwrap());

    assert_eq!(store.session_chunks("s1", 0, 10).unwrap().len(), 3);
}

#[test]
fn append_to_unknown_session_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::open(dir.path()).unwrap();
    assert!(matches!(
        store.append_chunk("nope", "x", ChunkKind::Stdout, 1),
        Err(OutputStoreError::UnknownSession(_))
    ));
}

#[test]
fn finalize_is_idempotent_and_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = OutputStore::open(dir.path()).unwrap();
        store.open_session(session_row("s1", "w1", 1000)).unwrap();
        store.finalize("s1", "stopped", 2000).unwrap();
        // Second finalize keeps the first status.
        store.finalize("s1", "completed", 3000).unwrap();
    }
    let store = OutputStore::open(dir.path()).unwrap();
    let row = store.session("s1").unwrap();
    assert_eq!(row.final_status.as_deref(), Some("stopped"));
    assert_eq!(row.ended_at_ms, Some(2000));
}

#[test]
fn recent_chunks_spans_sessions_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::open(dir.path()).unwrap();
    store.open_session(session_row("s1", "w1", 1000)).unwrap();
    store.open_session(session_row("s2", "w1", 2000)).unwrap();

    store.append_chunk("s1", "a", ChunkKind::Stdout, 1).unwrap();
    store.append_chunk("s2", "b", ChunkKind::Stdout, 2).unwrap();
    store.append_chunk("s2", "c", ChunkKind::Stdout, 3).unwrap();

    let recent = store.recent_chunks(&WorkerId::new("w1"), 2).unwrap();
    let contents: Vec<&str> = recent.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["b", "c"]);
}

#[test]
fn pagination_skips_and_takes() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::open(dir.path()).unwrap();
    store.open_session(session_row("s1", "w1", 1000)).unwrap();
    for i in 0..5 {
        store.append_chunk("s1", &format!("chunk{i}"), ChunkKind::Stdout, i).unwrap();
    }
    let page = store.session_chunks("s1", 2, 2).unwrap();
    let contents: Vec<&str> = page.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["chunk2", "chunk3"]);
}

#[test]
fn sweep_drops_expired_chunks_and_orphan_finalizes() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::open(dir.path()).unwrap();

    let day_ms = 24 * 60 * 60 * 1000u64;
    let now = 30 * day_ms;

    // Ended long ago: chunks expire.
    store.open_session(session_row("old", "w1", day_ms)).unwrap();
    store.append_chunk("old", "ancient", ChunkKind::Stdout, day_ms).unwrap();
    store.finalize("old", "completed", 2 * day_ms).unwrap();

    // Still open for >24h: orphan-finalized.
    store.open_session(session_row("stuck", "w2", day_ms)).unwrap();

    // Fresh and active: untouched.
    store.open_session(session_row("fresh", "w3", now - 1000)).unwrap();

    let (removed, orphaned) = store.sweep(now, 7).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(orphaned, 1);

    assert!(store.session_chunks("old", 0, 10).unwrap().is_empty());
    assert_eq!(store.session("stuck").unwrap().final_status.as_deref(), Some("orphaned"));
    assert!(store.session("fresh").unwrap().final_status.is_none());
}
