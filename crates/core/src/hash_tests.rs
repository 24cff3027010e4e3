// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn chunk_hash_is_deterministic() {
    assert_eq!(chunk_hash("hello"), chunk_hash("hello"));
    assert_ne!(chunk_hash("hello"), chunk_hash("hello "));
}

#[test]
fn fingerprint_changes_with_tail() {
    let a = pane_fingerprint("prompt> ");
    let b = pane_fingerprint("prompt> ls");
    assert_ne!(a, b);
}

#[test]
fn fingerprint_changes_with_length_even_if_tail_same() {
    // Same final 100 bytes, different total length.
    let tail = "x".repeat(100);
    let a = pane_fingerprint(&format!("aaaa{}", tail));
    let b = pane_fingerprint(&format!("aaaaaaaa{}", tail));
    assert_ne!(a, b);
}

#[test]
fn fingerprint_ignores_scrollback_above_tail() {
    // Identical length and tail, differing only in earlier content.
    let tail = "y".repeat(100);
    let a = pane_fingerprint(&format!("1234{}", tail));
    let b = pane_fingerprint(&format!("5678{}", tail));
    assert_eq!(a, b);
}

#[test]
fn tail_hash_distinct_for_distinct_prompts() {
    assert_ne!(tail_hash("Do you want to proceed?"), tail_hash("Do you want to overwrite?"));
}
