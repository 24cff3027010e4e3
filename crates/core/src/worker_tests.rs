// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec(path: &str) -> SpawnSpec {
    SpawnSpec { project_path: PathBuf::from(path), ..Default::default() }
}

#[test]
fn from_spec_derives_project_and_session() {
    let id = WorkerId::new("ab12cd34");
    let record =
        WorkerRecord::from_spec(id.clone(), id.session_name("fleet"), &spec("/proj/acme"), 1000);
    assert_eq!(record.project, "acme");
    assert_eq!(record.session, "fleet-ab12cd34");
    assert_eq!(record.status, WorkerStatus::Pending);
    assert_eq!(record.health, WorkerHealth::Healthy);
    assert_eq!(record.created_at_ms, 1000);
}

#[test]
fn from_spec_defaults_label() {
    let id = WorkerId::new("ab12cd34");
    let record = WorkerRecord::from_spec(id.clone(), "s".into(), &spec("/proj/acme"), 0);
    assert_eq!(record.label, "worker ab12cd34");
}

#[test]
fn strategic_label_detection() {
    let id = WorkerId::new("ab12cd34");
    let mut record = WorkerRecord::from_spec(id, "s".into(), &spec("/p"), 0);
    assert!(!record.is_strategic());
    record.label = "GENERAL: campaign lead".to_string();
    assert!(record.is_strategic());
}

#[test]
fn status_terminality() {
    assert!(!WorkerStatus::Pending.is_terminal());
    assert!(!WorkerStatus::Running.is_terminal());
    assert!(WorkerStatus::Completed.is_terminal());
    assert!(WorkerStatus::Stopped.is_terminal());
    assert!(WorkerStatus::Error.is_terminal());
}

#[yare::parameterized(
    at_limit = { 256, true },
    over     = { 257, false },
)]
fn label_length_boundary(len: usize, ok: bool) {
    let label = "x".repeat(len);
    assert_eq!(validate_label(&label).is_ok(), ok);
}

#[test]
fn label_rejects_control_characters() {
    assert!(validate_label("fine label").is_ok());
    assert!(validate_label("bad\x07label").is_err());
    assert!(validate_label("bad\nlabel").is_err());
}

#[test]
fn record_round_trips_and_normalizes_missing_fields() {
    // A minimal record as an older schema might have written it.
    let json = serde_json::json!({
        "id": "ab12cd34",
        "label": "TEST",
        "project": "acme",
        "project_path": "/proj/acme",
        "session": "fleet-ab12cd34",
        "status": "running",
        "created_at_ms": 5,
    });
    let record: WorkerRecord = serde_json::from_value(json).unwrap();
    assert_eq!(record.status, WorkerStatus::Running);
    assert!(!record.auto_accept);
    assert!(!record.ralph_mode);
    assert!(record.depends_on.is_empty());
    assert!(record.children.is_empty());
    assert_eq!(record.health, WorkerHealth::Healthy);

    let back: WorkerRecord =
        serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
    assert_eq!(back, record);
}

#[test]
fn on_complete_serde_tags_by_kind() {
    let action = OnComplete::Webhook {
        url: "http://localhost:9999/hook".into(),
        method: Some("POST".into()),
        headers: HashMap::new(),
        body: None,
    };
    let json = serde_json::to_value(&action).unwrap();
    assert_eq!(json["kind"], "webhook");

    let emit: OnComplete =
        serde_json::from_value(serde_json::json!({"kind": "emit", "event": "custom:done"}))
            .unwrap();
    assert!(matches!(emit, OnComplete::Emit { ref event, .. } if event == "custom:done"));
}
