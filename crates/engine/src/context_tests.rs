// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::{SpawnSpec, TaskSpec, WorkerId};
use std::path::PathBuf;

fn record(ralph: bool) -> WorkerRecord {
    let id = WorkerId::new("ab12cd34");
    let spec = SpawnSpec {
        project_path: PathBuf::from("/proj/acme"),
        label: Some("TEST: ctx".into()),
        task: Some(TaskSpec {
            description: "port the parser".into(),
            context: Some("legacy code in src/old".into()),
            constraints: Some("no new dependencies".into()),
            task_type: None,
        }),
        ..Default::default()
    };
    let mut record = WorkerRecord::from_spec(id.clone(), id.session_name("fleet"), &spec, 0);
    if ralph {
        record.ralph_mode = true;
        record.ralph_token = Some("tok1234567".into());
    }
    record
}

#[test]
fn context_file_names_identity_and_api() {
    let contents = context_file_contents(&record(false), "http://127.0.0.1:4100", "fleet");
    assert!(contents.contains("worker id: `ab12cd34`"));
    assert!(contents.contains("label: `TEST: ctx`"));
    assert!(contents.contains("http://127.0.0.1:4100"));
    assert!(contents.contains("fleet-ab12cd34"));
    assert!(!contents.contains("completion token"));
}

#[test]
fn context_file_includes_token_when_issued() {
    let contents = context_file_contents(&record(true), "http://127.0.0.1:4100", "fleet");
    assert!(contents.contains("completion token: `tok1234567`"));
    assert!(contents.contains("/api/ralph/signal/tok1234567"));
}

#[test]
fn prompt_contains_structured_sections() {
    let prompt = self_awareness_prompt(&record(true), "http://127.0.0.1:4100");
    for section in
        ["IDENTITY:", "MISSION:", "ENVIRONMENT:", "TOOLS:", "GUIDELINES:", "SELF-CORRECTION:",
         "BOUNDARIES:", "SAFETY:", "TASK CONTEXT:", "CONSTRAINTS:", "COMPLETION:"]
    {
        assert!(prompt.contains(section), "missing {section}");
    }
    assert!(prompt.contains("port the parser"));
}

#[test]
fn prompt_mentions_parent_for_delegates() {
    let mut rec = record(false);
    rec.parent = Some(WorkerId::new("gen00001"));
    rec.parent_label = Some("GENERAL: campaign".into());
    let prompt = self_awareness_prompt(&rec, "http://127.0.0.1:4100");
    assert!(prompt.contains("DELEGATION:"));
    assert!(prompt.contains("gen00001"));
}

#[test]
fn nudge_names_the_signal_endpoint() {
    let nudge = ralph_nudge(&record(true), "http://127.0.0.1:4100");
    assert!(nudge.contains("/api/ralph/signal/tok1234567"));
    assert!(nudge.contains("in_progress"));
}

#[test]
fn context_path_joins_project_dir() {
    assert_eq!(
        context_file_path(Path::new("/proj/acme"), "FLEET.md"),
        PathBuf::from("/proj/acme/FLEET.md")
    );
}
