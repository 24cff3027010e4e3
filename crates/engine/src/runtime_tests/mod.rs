// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod lifecycle;
mod recovery;
mod spawn;

use super::{Runtime, RuntimeDeps};
use crate::config::EngineConfig;
use crate::push::PushFrame;
use fleet_adapters::{BackendRegistry, ClaudeBackend, FakeSessionAdapter};
use fleet_core::{Clock, Event, FakeClock, SpawnSpec, WorkerStatus};
use fleet_storage::{MaterializedState, OutputStore};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub(crate) struct Rig {
    pub runtime: Runtime<FakeSessionAdapter, FakeClock>,
    pub fake: FakeSessionAdapter,
    pub clock: FakeClock,
    pub event_rx: mpsc::Receiver<Event>,
    pub push_rx: broadcast::Receiver<PushFrame>,
    pub project: tempfile::TempDir,
    _outputs: tempfile::TempDir,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(mut config: EngineConfig) -> Self {
        // Capture loops are exercised in capture_tests; park them here so
        // background ticks can't race the fake clock.
        config.capture_tick = Duration::from_secs(3600);
        let project = tempfile::tempdir().unwrap();
        let outputs_dir = tempfile::tempdir().unwrap();
        let fake = FakeSessionAdapter::new();
        let clock = FakeClock::new();
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (push_tx, push_rx) = broadcast::channel(1024);

        let deps = RuntimeDeps {
            sessions: fake.clone(),
            state: Arc::new(Mutex::new(MaterializedState::default())),
            outputs: Arc::new(OutputStore::open(outputs_dir.path()).unwrap()),
            backends: BackendRegistry::with_default(Arc::new(ClaudeBackend::default())),
            clock: clock.clone(),
            config,
            event_tx,
            push_tx,
        };
        let runtime = Runtime::new(deps);

        Rig { runtime, fake, clock, event_rx, push_rx, project, _outputs: outputs_dir }
    }

    pub fn spec(&self) -> SpawnSpec {
        SpawnSpec { project_path: self.project.path().to_path_buf(), ..Default::default() }
    }

    /// Drain the event channel the way the daemon loop would: apply,
    /// handle, publish, until quiescent.
    pub async fn pump(&mut self) {
        loop {
            let Ok(event) = self.event_rx.try_recv() else {
                return;
            };
            self.runtime.state().lock().apply_event(&event);
            self.runtime.handle_event(event.clone()).await.unwrap();
            self.runtime.publish(&event);
        }
    }

    /// Fire due scheduler timers and process the fallout.
    pub async fn fire_timers(&mut self) {
        let fired = {
            let scheduler = self.runtime.scheduler();
            let now = self.clock.now();
            let mut guard = scheduler.lock();
            guard.fired_timers(now)
        };
        for event in fired {
            self.runtime.handle_event(event).await.unwrap();
        }
        self.pump().await;
    }

    pub fn status_of(&self, id: &str) -> Option<WorkerStatus> {
        self.runtime.get_worker(id).map(|w| w.status)
    }

    pub fn context_file(&self) -> PathBuf {
        self.project.path().join("FLEET.md")
    }

    pub fn drain_push(&mut self) -> Vec<PushFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.push_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}
