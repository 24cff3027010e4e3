// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn registry_resolves_default_for_none_and_empty() {
    let registry = BackendRegistry::with_default(Arc::new(ClaudeBackend::default()));
    assert_eq!(registry.get(None).unwrap().name(), "claude");
    assert_eq!(registry.get(Some("")).unwrap().name(), "claude");
    assert_eq!(registry.default_backend().name(), "claude");
}

#[test]
fn registry_rejects_unknown_names() {
    let registry = BackendRegistry::with_default(Arc::new(ClaudeBackend::default()));
    assert!(registry.get(Some("cursor")).is_none());
}

#[test]
fn registered_backends_resolve_by_name() {
    let mut registry = BackendRegistry::with_default(Arc::new(ClaudeBackend::default()));
    registry.register(Arc::new(ClaudeBackend::new("claude --model opus")));
    // Same name overwrites; still resolvable.
    assert_eq!(
        registry.get(Some("claude")).unwrap().spawn_command(),
        "claude --model opus"
    );
}
