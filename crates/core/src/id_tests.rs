// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_are_eight_chars() {
    let id = WorkerId::generate();
    assert_eq!(id.as_str().len(), 8);
    assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn generated_ids_are_unique() {
    let a = WorkerId::generate();
    let b = WorkerId::generate();
    assert_ne!(a, b);
}

#[test]
fn session_name_joins_prefix_and_id() {
    let id = WorkerId::new("ab12cd34");
    assert_eq!(id.session_name("fleet"), "fleet-ab12cd34");
}

#[test]
fn serde_is_transparent() {
    let id = WorkerId::new("ab12cd34");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"ab12cd34\"");
    let back: WorkerId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn borrow_str_allows_map_lookup() {
    use std::collections::HashMap;
    let mut map: HashMap<WorkerId, u32> = HashMap::new();
    map.insert(WorkerId::new("ab12cd34"), 1);
    assert_eq!(map.get("ab12cd34"), Some(&1));
}

#[yare::parameterized(
    zero  = { "", 0, "" },
    under = { "abcd", 8, "abcd" },
    exact = { "abcd", 4, "abcd" },
    over  = { "abcdefgh", 4, "abcd" },
)]
fn short_truncates(input: &str, n: usize, expected: &str) {
    assert_eq!(short(input, n), expected);
}
