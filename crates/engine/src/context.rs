// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context-file and self-awareness prompt generation.
//!
//! Before a session starts, a context file lands in the project directory
//! so the backend assistant picks up its identity and how to talk back to
//! the control API. After the backend settles, a structured prompt is
//! injected into the session itself.

use fleet_core::WorkerRecord;
use std::path::{Path, PathBuf};

/// Path of the context file inside the project directory.
pub fn context_file_path(project_path: &Path, file_name: &str) -> PathBuf {
    project_path.join(file_name)
}

/// Contents of the per-project context file.
pub fn context_file_contents(
    record: &WorkerRecord,
    api_base: &str,
    session_prefix: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Fleet worker context\n\n");
    out.push_str("This file is managed by the fleet daemon and removed when the worker is killed.\n\n");
    out.push_str("## Identity\n\n");
    out.push_str(&format!("- worker id: `{}`\n", record.id));
    out.push_str(&format!("- label: `{}`\n", record.label));
    out.push_str(&format!("- project: `{}`\n", record.project));
    out.push_str(&format!("- working directory: `{}`\n", record.project_path.display()));
    out.push_str(&format!("- session: `{}` (prefix `{}-`)\n", record.session, session_prefix));
    if let Some(token) = &record.ralph_token {
        out.push_str(&format!("- completion token: `{token}`\n"));
    }
    out.push_str(&format!("\n## Control API\n\nBase URL: `{api_base}`\n\n"));
    out.push_str("Spawn a delegate worker:\n\n```sh\ncurl -s -X POST ");
    out.push_str(api_base);
    out.push_str("/api/workers \\\n  -H 'content-type: application/json' \\\n  -d '{\"projectPath\": \"");
    out.push_str(&record.project_path.display().to_string());
    out.push_str("\", \"label\": \"delegate\", \"parentWorkerId\": \"");
    out.push_str(record.id.as_str());
    out.push_str("\"}'\n```\n");
    if let Some(token) = &record.ralph_token {
        out.push_str("\nReport progress (terminal statuses are `done` and `blocked`):\n\n```sh\ncurl -s -X POST ");
        out.push_str(api_base);
        out.push_str(&format!("/api/ralph/signal/{token} \\\n"));
        out.push_str(
            "  -H 'content-type: application/json' \\\n  -d '{\"status\": \"in_progress\", \"progress\": 25, \"currentStep\": \"...\"}'\n```\n",
        );
    }
    out
}

/// The structured self-awareness prompt injected after the init delay.
pub fn self_awareness_prompt(record: &WorkerRecord, api_base: &str) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "IDENTITY: You are managed worker {id} (\"{label}\") in project {project}.",
        id = record.id,
        label = record.label,
        project = record.project,
    ));
    sections.push(match &record.task {
        Some(task) => format!("MISSION: {}", task.description),
        None => "MISSION: Assist with the tasks sent to this session.".to_string(),
    });
    sections.push(format!(
        "ENVIRONMENT: Working directory {} inside a detached terminal session; \
         your output is captured continuously.",
        record.project_path.display(),
    ));
    sections.push(format!(
        "TOOLS: The fleet control API at {api_base} lets you spawn delegate workers, \
         inspect their status, and send them input.",
    ));
    sections.push(
        "GUIDELINES: Work incrementally, prefer small verifiable steps, and keep \
         the session output readable."
            .to_string(),
    );
    sections.push(
        "SELF-CORRECTION: When a command fails, read the error before retrying; \
         do not loop on the same failing invocation."
            .to_string(),
    );
    sections.push(format!(
        "BOUNDARIES: Stay inside {}; do not modify unrelated projects.",
        record.project_path.display(),
    ));
    sections.push(
        "SAFETY: Never run destructive commands against shared infrastructure \
         without an explicit instruction in your task."
            .to_string(),
    );
    if let Some(task) = &record.task {
        if let Some(context) = &task.context {
            sections.push(format!("TASK CONTEXT: {context}"));
        }
        if let Some(constraints) = &task.constraints {
            sections.push(format!("CONSTRAINTS: {constraints}"));
        }
    }
    if let Some(token) = &record.ralph_token {
        sections.push(format!(
            "COMPLETION: Report progress with POST {api_base}/api/ralph/signal/{token} \
             (status in_progress while working, done or blocked when finished).",
        ));
    }
    if let (Some(parent), Some(parent_label)) = (&record.parent, &record.parent_label) {
        sections.push(format!(
            "DELEGATION: You were spawned by worker {parent} (\"{parent_label}\"); \
             it polls your status, so signal honestly.",
        ));
    }

    sections.join("\n")
}

/// Reminder injected when a ralph worker has not signaled yet.
pub fn ralph_nudge(record: &WorkerRecord, api_base: &str) -> String {
    let token = record.ralph_token.as_deref().unwrap_or_default();
    format!(
        "Reminder: no progress signal received yet. POST {api_base}/api/ralph/signal/{token} \
         with {{\"status\": \"in_progress\"}} now, and with done/blocked when you finish.",
    )
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
