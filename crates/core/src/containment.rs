// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Containment envelope for untrusted terminal output.
//!
//! Captured pane text may be fed to downstream language-model consumers
//! (summarizers and the like). Terminal output is attacker-influenced, so
//! before it leaves the engine it is wrapped in an explicit envelope with
//! tag-like delimiters escaped and instruction-shaped lines removed.

/// Line prefixes that are stripped from untrusted payloads.
const DIRECTIVE_PREFIXES: &[&str] =
    &["system:", "assistant:", "user:", "ignore previous", "ignore all previous"];

/// Wrap untrusted terminal output in a containment envelope.
pub fn contain_output(raw: &str) -> String {
    let cleaned = sanitize_lines(raw);
    format!(
        "<untrusted-terminal-output>\n{}\n</untrusted-terminal-output>",
        cleaned
    )
}

/// Escape tag delimiters and drop lines that read as chat directives.
fn sanitize_lines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut first = true;
    for line in raw.lines() {
        let lowered = line.trim_start().to_ascii_lowercase();
        if DIRECTIVE_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            continue;
        }
        if !first {
            out.push('\n');
        }
        first = false;
        for c in line.chars() {
            match c {
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                _ => out.push(c),
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "containment_tests.rs"]
mod tests;
