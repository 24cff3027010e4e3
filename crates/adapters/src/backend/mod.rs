// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend capability trait.
//!
//! A backend is one assistant CLI the daemon can host in a session. What
//! differs between them: the command line to start, the context file the
//! assistant auto-loads, how long the CLI takes to settle before input is
//! safe, and the prompt shapes the auto-accept detector must recognize.

mod claude;

pub use claude::ClaudeBackend;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub trait Backend: Send + Sync + 'static {
    /// Registry key ("claude", ...).
    fn name(&self) -> &str;

    /// Command line started inside the session.
    fn spawn_command(&self) -> String;

    /// File name of the per-project context file this backend auto-loads.
    fn context_file_name(&self) -> &str;

    /// Delay between session creation and the first injected prompt.
    fn init_delay(&self) -> Duration;

    /// Regex sources matching confirmation prompts worth auto-accepting.
    fn accept_patterns(&self) -> Vec<String>;

    /// Case-insensitive substrings whose presence pauses auto-accept.
    fn pause_keywords(&self) -> Vec<String>;
}

/// Named backends with a default fallback.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
    default_name: String,
}

impl BackendRegistry {
    /// Build a registry with a single default backend.
    pub fn with_default(backend: Arc<dyn Backend>) -> Self {
        let default_name = backend.name().to_string();
        let mut backends = HashMap::new();
        backends.insert(default_name.clone(), backend);
        Self { backends, default_name }
    }

    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Resolve a backend by name, falling back to the default for `None`.
    /// Unknown names resolve to `None` so spawn can reject them.
    pub fn get(&self, name: Option<&str>) -> Option<Arc<dyn Backend>> {
        match name {
            None | Some("") => self.backends.get(&self.default_name).cloned(),
            Some(n) => self.backends.get(n).cloned(),
        }
    }

    pub fn default_backend(&self) -> Arc<dyn Backend> {
        // Invariant: constructed with the default present
        match self.backends.get(&self.default_name) {
            Some(b) => Arc::clone(b),
            None => unreachable!("registry constructed without default backend"),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
