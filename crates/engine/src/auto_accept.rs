// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-accept of confirmation prompts.
//!
//! The detector inspects only the last 500 bytes of the ANSI-stripped pane.
//! Pause keywords (plan mode, interactive questions) suspend it entirely;
//! otherwise a matching prompt earns one Enter keystroke, gated by a hash
//! of the inspection window so an unchanged screen can't re-fire inside
//! the re-arm window.

use fleet_core::tail_hash;
use regex::{Regex, RegexSet, RegexSetBuilder};
use std::time::{Duration, Instant};

/// Inspection window over the stripped capture.
const TAIL_BYTES: usize = 500;

/// Re-arm window after a fired keystroke.
const REARM: Duration = Duration::from_millis(1500);

/// What the detector decided for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoAcceptAction {
    None,
    /// A pause keyword appeared in the tail.
    Pause,
    /// Pause keywords disappeared; the hash gate was cleared.
    Resume,
    /// A confirmation prompt matched: send one Enter.
    Fire { hash: u64 },
}

/// Per-worker detector state, owned by the capture loop.
#[derive(Debug, Default)]
pub struct AutoAcceptState {
    pub paused: bool,
    last_hash: Option<u64>,
    fired_at: Option<Instant>,
}

/// Compiled prompt patterns for one backend.
pub struct AutoAccept {
    accept: RegexSet,
    pause_keywords: Vec<String>,
    ansi: Regex,
}

impl AutoAccept {
    pub fn new(
        accept_patterns: &[String],
        pause_keywords: &[String],
    ) -> Result<Self, regex::Error> {
        let accept =
            RegexSetBuilder::new(accept_patterns).case_insensitive(true).build()?;
        // CSI sequences plus OSC strings (BEL or ST terminated)
        let ansi = Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(\x07|\x1b\\)")?;
        Ok(Self {
            accept,
            pause_keywords: pause_keywords.iter().map(|k| k.to_lowercase()).collect(),
            ansi,
        })
    }

    /// Remove control sequences from a capture.
    pub fn strip_ansi(&self, text: &str) -> String {
        self.ansi.replace_all(text, "").into_owned()
    }

    /// Inspect one capture tick. `enabled` is the worker's autoAccept flag.
    pub fn inspect(
        &self,
        pane: &str,
        enabled: bool,
        state: &mut AutoAcceptState,
        now: Instant,
    ) -> AutoAcceptAction {
        let stripped = self.strip_ansi(pane);
        let tail = tail_of(&stripped);
        let lowered = tail.to_lowercase();

        // Pause gating runs even when disabled so the flag tracks reality.
        let pause_now = self.pause_keywords.iter().any(|k| lowered.contains(k));
        if pause_now != state.paused {
            state.paused = pause_now;
            if pause_now {
                return AutoAcceptAction::Pause;
            }
            state.last_hash = None;
            return AutoAcceptAction::Resume;
        }

        if !enabled || state.paused {
            return AutoAcceptAction::None;
        }

        // Hash-clear after the re-arm window, so the next distinct prompt
        // (or a stubborn identical one) can be handled again.
        if let Some(fired_at) = state.fired_at {
            if now.duration_since(fired_at) < REARM {
                return AutoAcceptAction::None;
            }
            state.fired_at = None;
            state.last_hash = None;
        }

        let hash = tail_hash(tail);
        if state.last_hash == Some(hash) {
            return AutoAcceptAction::None;
        }

        if self.accept.is_match(tail) {
            state.last_hash = Some(hash);
            state.fired_at = Some(now);
            return AutoAcceptAction::Fire { hash };
        }
        AutoAcceptAction::None
    }
}

/// Last `TAIL_BYTES` of the stripped capture, on a char boundary.
fn tail_of(stripped: &str) -> &str {
    if stripped.len() <= TAIL_BYTES {
        return stripped;
    }
    let mut start = stripped.len() - TAIL_BYTES;
    while start < stripped.len() && !stripped.is_char_boundary(start) {
        start += 1;
    }
    &stripped[start..]
}

#[cfg(test)]
#[path = "auto_accept_tests.rs"]
mod tests;
