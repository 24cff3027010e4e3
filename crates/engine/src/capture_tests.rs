// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_adapters::{Backend, ClaudeBackend, FakeSessionAdapter};
use fleet_core::{SpawnSpec, SystemClock, WorkerRecord};
use fleet_storage::OutputSessionRow;
use std::path::{Path, PathBuf};

struct Rig {
    hub: Arc<CaptureHub>,
    fake: FakeSessionAdapter,
    state: Arc<Mutex<MaterializedState>>,
    outputs: Arc<OutputStore>,
    event_rx: mpsc::Receiver<Event>,
    push_rx: broadcast::Receiver<PushFrame>,
    _dir: tempfile::TempDir,
}

const WORKER: &str = "ab12cd34";
const SESSION: &str = "fleet-ab12cd34";
const OUT_SESSION: &str = "out-1";

async fn rig(auto_accept: bool) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeSessionAdapter::new();
    fake.create(SESSION, Path::new("/tmp"), 120, 40, "claude").await.unwrap();

    let id = WorkerId::new(WORKER);
    let spec = SpawnSpec {
        project_path: PathBuf::from("/tmp"),
        auto_accept,
        ..Default::default()
    };
    let mut record = WorkerRecord::from_spec(id.clone(), SESSION.to_string(), &spec, 0);
    record.status = WorkerStatus::Running;

    let mut state = MaterializedState::default();
    state.apply_event(&Event::WorkerCreated { worker: Box::new(record) });
    let state = Arc::new(Mutex::new(state));

    let outputs = Arc::new(OutputStore::open(dir.path()).unwrap());
    outputs
        .open_session(OutputSessionRow {
            session_id: OUT_SESSION.into(),
            worker: id.clone(),
            label: "TEST".into(),
            project: "tmp".into(),
            working_dir: PathBuf::from("/tmp"),
            task_description: None,
            started_at_ms: 0,
            ended_at_ms: None,
            final_status: None,
        })
        .unwrap();

    let (event_tx, event_rx) = mpsc::channel(256);
    let (push_tx, push_rx) = broadcast::channel(256);

    let hub = Arc::new(CaptureHub::new());
    let backend = ClaudeBackend::default();
    let detector =
        AutoAccept::new(&backend.accept_patterns(), &backend.pause_keywords()).unwrap();
    let deps = CaptureDeps {
        sessions: fake.clone(),
        state: Arc::clone(&state),
        outputs: Arc::clone(&outputs),
        event_tx,
        push_tx,
        clock: SystemClock,
        tick: Duration::from_millis(10),
        grace: Duration::from_millis(50),
    };
    assert!(start_capture(
        &hub,
        deps,
        id,
        SESSION.to_string(),
        OUT_SESSION.to_string(),
        detector,
    ));

    Rig { hub, fake, state, outputs, event_rx, push_rx, _dir: dir }
}

fn drain_observed(rx: &mut mpsc::Receiver<Event>) -> usize {
    let mut seen = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, Event::OutputObserved { .. }) {
            seen += 1;
        }
    }
    seen
}

#[tokio::test]
async fn change_is_captured_persisted_and_fanned_out() {
    let mut rig = rig(false).await;
    rig.fake.set_pane(SESSION, "hello from the pane");

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(drain_observed(&mut rig.event_rx) >= 1);
    assert_eq!(
        rig.hub.output_snapshot(&WorkerId::new(WORKER)).unwrap(),
        "hello from the pane"
    );
    let chunks = rig.outputs.session_chunks(OUT_SESSION, 0, 10).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "hello from the pane");

    let frame = rig.push_rx.try_recv().unwrap();
    assert_eq!(frame.event, "worker:output");
    assert_eq!(frame.data["chunk"], "hello from the pane");
}

#[tokio::test]
async fn unchanged_pane_reports_once() {
    let mut rig = rig(false).await;
    rig.fake.set_pane(SESSION, "static output");

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Many ticks, one observation: the fingerprint didn't change.
    assert_eq!(drain_observed(&mut rig.event_rx), 1);
    assert_eq!(rig.outputs.session_chunks(OUT_SESSION, 0, 10).unwrap().len(), 1);
}

#[tokio::test]
async fn vanished_session_stops_worker_after_grace() {
    let mut rig = rig(false).await;
    tokio::time::sleep(Duration::from_millis(80)).await; // past grace
    rig.fake.remove_session(SESSION);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut stopped = false;
    while let Ok(event) = rig.event_rx.try_recv() {
        if matches!(event, Event::WorkerStopped { ref reason, .. } if reason == "session vanished")
        {
            stopped = true;
        }
    }
    assert!(stopped);
    assert!(!rig.hub.is_running(&WorkerId::new(WORKER)));
}

#[tokio::test]
async fn auto_accept_sends_exactly_one_enter_for_one_prompt() {
    let rig = rig(true).await;
    rig.fake.set_pane(SESSION, "Do you want to proceed? [Y/n]");

    // Well under the 1.5 s re-arm window, across many ticks.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(rig.fake.enter_count(SESSION), 1);
}

#[tokio::test]
async fn terminal_status_ends_the_loop() {
    let rig = rig(false).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    rig.state
        .lock()
        .apply_event(&Event::WorkerCompleted { id: WorkerId::new(WORKER), at_ms: 1 });
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(!rig.hub.is_running(&WorkerId::new(WORKER)));
}

#[tokio::test]
async fn duplicate_start_is_rejected() {
    let rig = rig(false).await;
    let (event_tx, _event_rx) = mpsc::channel(8);
    let (push_tx, _push_rx) = broadcast::channel(8);
    let backend = ClaudeBackend::default();
    let deps = CaptureDeps {
        sessions: rig.fake.clone(),
        state: Arc::clone(&rig.state),
        outputs: Arc::clone(&rig.outputs),
        event_tx,
        push_tx,
        clock: SystemClock,
        tick: Duration::from_millis(10),
        grace: Duration::from_millis(50),
    };
    let detector =
        AutoAccept::new(&backend.accept_patterns(), &backend.pause_keywords()).unwrap();
    assert!(!start_capture(
        &rig.hub,
        deps,
        WorkerId::new(WORKER),
        SESSION.to_string(),
        OUT_SESSION.to_string(),
        detector,
    ));
}
