// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn set_stores_snapshot_under_capacity() {
    let mut ring = OutputRing::new(32);
    ring.set("hello");
    assert_eq!(ring.snapshot(), "hello");
}

#[test]
fn set_keeps_tail_when_over_capacity() {
    let mut ring = OutputRing::new(8);
    ring.set("0123456789abcdef");
    assert_eq!(ring.snapshot(), "89abcdef");
    assert_eq!(ring.len(), 8);
}

#[test]
fn set_respects_char_boundaries() {
    let mut ring = OutputRing::new(5);
    ring.set("ααααα"); // 2 bytes each
    let tail = ring.snapshot();
    assert!(tail.len() <= 5);
    assert!(tail.chars().all(|c| c == 'α'));
}

#[test]
fn replacement_discards_previous_contents() {
    let mut ring = OutputRing::new(64);
    ring.set("first pane");
    ring.set("second pane");
    assert_eq!(ring.snapshot(), "second pane");
}
