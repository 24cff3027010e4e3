// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker data model.
//!
//! A worker is one managed assistant process living in a detached terminal
//! session. `WorkerRecord` is the canonical registry entry; every field added
//! after the first schema version carries a serde default so snapshots written
//! by older daemons normalize on load.

use crate::id::WorkerId;
use crate::ralph::RalphStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Maximum accepted label length in characters.
pub const MAX_LABEL_LEN: usize = 256;

/// Lifecycle status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Pending,
    Running,
    Completed,
    Stopped,
    Error,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerStatus::Completed | WorkerStatus::Stopped | WorkerStatus::Error)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Pending => write!(f, "pending"),
            WorkerStatus::Running => write!(f, "running"),
            WorkerStatus::Completed => write!(f, "completed"),
            WorkerStatus::Stopped => write!(f, "stopped"),
            WorkerStatus::Error => write!(f, "error"),
        }
    }
}

/// Liveness classification maintained by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerHealth {
    #[default]
    Healthy,
    Stalled,
    Dead,
}

impl std::fmt::Display for WorkerHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerHealth::Healthy => write!(f, "healthy"),
            WorkerHealth::Stalled => write!(f, "stalled"),
            WorkerHealth::Dead => write!(f, "dead"),
        }
    }
}

/// How the worker's process is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    /// Detached terminal-multiplexer session (the normal mode).
    #[default]
    Multiplexed,
    /// Direct PTY child (no multiplexer).
    Direct,
}

/// Optional structured task description attached at spawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
}

/// Action dispatched when a worker completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OnComplete {
    /// Spawn another worker from the given options.
    Spawn { options: Box<SpawnSpec> },
    /// POST a webhook.
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    /// Publish a custom push event to subscribers.
    Emit {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

/// Spawn request options, as accepted from external callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub project_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<OnComplete>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_input: Option<String>,
    #[serde(default)]
    pub auto_accept: bool,
    #[serde(default)]
    pub ralph_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Opt out of the auto-cleanup kill after completion.
    #[serde(default)]
    pub keep_alive: bool,
}

/// Canonical registry entry for one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub label: String,
    pub project: String,
    pub project_path: PathBuf,
    /// Terminal-session name, derived as `<prefix>-<id>`.
    pub session: String,
    #[serde(default)]
    pub backend: String,
    pub status: WorkerStatus,
    #[serde(default)]
    pub mode: WorkerMode,
    pub created_at_ms: u64,
    #[serde(default)]
    pub last_activity_ms: u64,
    #[serde(default)]
    pub last_output_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub health: WorkerHealth,
    #[serde(default)]
    pub queued_commands: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskSpec>,
    #[serde(default)]
    pub auto_accept: bool,
    #[serde(default)]
    pub auto_accept_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_auto_accept_hash: Option<u64>,
    #[serde(default)]
    pub ralph_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_status: Option<RalphStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_learnings: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ralph_outputs: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ralph_artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ralph_signaled_at_ms: Option<u64>,
    /// First input sent after the init prompt (pending workers keep it
    /// until promotion).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_input: Option<String>,
    /// Action dispatched when this worker completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<OnComplete>,
    #[serde(default)]
    pub keep_alive: bool,
}

impl WorkerRecord {
    /// Build a record from spawn options. Status starts as `Pending`;
    /// the spawn path flips it to `Running` once a session exists.
    pub fn from_spec(id: WorkerId, session: String, spec: &SpawnSpec, now_ms: u64) -> Self {
        let project = spec
            .project_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            label: spec.label.clone().unwrap_or_else(|| format!("worker {}", id)),
            project,
            project_path: spec.project_path.clone(),
            session,
            backend: spec.backend.clone().unwrap_or_default(),
            status: WorkerStatus::Pending,
            mode: WorkerMode::Multiplexed,
            created_at_ms: now_ms,
            last_activity_ms: now_ms,
            last_output_ms: now_ms,
            completed_at_ms: None,
            health: WorkerHealth::Healthy,
            queued_commands: 0,
            depends_on: spec.depends_on.clone(),
            workflow_id: spec.workflow_id.clone(),
            task_id: spec.task_id.clone(),
            parent: spec.parent.clone(),
            parent_label: spec.parent_label.clone(),
            children: Vec::new(),
            task: spec.task.clone(),
            auto_accept: spec.auto_accept,
            auto_accept_paused: false,
            last_auto_accept_hash: None,
            ralph_mode: spec.ralph_mode,
            ralph_token: None,
            ralph_status: None,
            ralph_progress: None,
            ralph_current_step: None,
            ralph_learnings: None,
            ralph_outputs: HashMap::new(),
            ralph_artifacts: Vec::new(),
            ralph_signaled_at_ms: None,
            initial_input: spec.initial_input.clone(),
            on_complete: spec.on_complete.clone(),
            keep_alive: spec.keep_alive,
            id,
        }
    }

    /// Strategic workers (label `GENERAL:*`) get a completion token even
    /// without ralph_mode.
    pub fn is_strategic(&self) -> bool {
        self.label.starts_with("GENERAL:")
    }

    /// Short task description for children roll-ups.
    pub fn task_summary(&self) -> Option<&str> {
        self.task.as_ref().map(|t| crate::id::short(&t.description, 120))
    }
}

/// Validate a worker label: bounded length, no control characters.
pub fn validate_label(label: &str) -> Result<(), String> {
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(format!("label exceeds {} characters", MAX_LABEL_LEN));
    }
    if label.chars().any(|c| c.is_control()) {
        return Err("label contains control characters".to_string());
    }
    Ok(())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
