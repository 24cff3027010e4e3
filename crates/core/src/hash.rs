// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content hashes for output dedup and pane-change detection.

use sha2::{Digest, Sha256};

/// 64-bit content hash of an output chunk (dedup key).
pub fn chunk_hash(content: &str) -> u64 {
    digest64(&[content.as_bytes()])
}

/// Pane-change fingerprint: hashes the capture length plus its final
/// 100 bytes. Cheap to compute every tick and stable across scrollback
/// that only shifts above the tail.
pub fn pane_fingerprint(capture: &str) -> u64 {
    let bytes = capture.as_bytes();
    let tail_start = bytes.len().saturating_sub(100);
    let len = (bytes.len() as u64).to_be_bytes();
    digest64(&[&len, &bytes[tail_start..]])
}

/// Hash of the auto-accept inspection window (last 500 bytes, caller strips
/// ANSI first). Gates repeated keystrokes against an unchanged prompt.
pub fn tail_hash(tail: &str) -> u64 {
    digest64(&[tail.as_bytes()])
}

fn digest64(parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(out)
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
