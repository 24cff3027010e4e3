// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared world for the scenario specs.

use fleet_adapters::{BackendRegistry, ClaudeBackend, FakeSessionAdapter};
use fleet_core::{Clock, Event, FakeClock, SpawnSpec};
use fleet_engine::{EngineConfig, PushFrame, Runtime, RuntimeDeps};
use fleet_storage::{MaterializedState, OutputStore};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub struct World {
    pub runtime: Runtime<FakeSessionAdapter, FakeClock>,
    pub sessions: FakeSessionAdapter,
    pub clock: FakeClock,
    pub event_rx: mpsc::Receiver<Event>,
    pub push_rx: broadcast::Receiver<PushFrame>,
    pub project: tempfile::TempDir,
    _outputs: tempfile::TempDir,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(mut config: EngineConfig) -> Self {
        // Fast capture ticks so output flows during a test run.
        if config.capture_tick >= Duration::from_secs(1) {
            config.capture_tick = Duration::from_millis(20);
        }
        let project = tempfile::tempdir().unwrap();
        let outputs = tempfile::tempdir().unwrap();
        let sessions = FakeSessionAdapter::new();
        let clock = FakeClock::new();
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (push_tx, push_rx) = broadcast::channel(1024);

        let runtime = Runtime::new(RuntimeDeps {
            sessions: sessions.clone(),
            state: Arc::new(Mutex::new(MaterializedState::default())),
            outputs: Arc::new(OutputStore::open(outputs.path()).unwrap()),
            backends: BackendRegistry::with_default(Arc::new(ClaudeBackend::default())),
            clock: clock.clone(),
            config,
            event_tx,
            push_tx,
        });

        World { runtime, sessions, clock, event_rx, push_rx, project, _outputs: outputs }
    }

    pub fn spec(&self) -> SpawnSpec {
        SpawnSpec { project_path: self.project.path().to_path_buf(), ..Default::default() }
    }

    /// Drain pending events the way the daemon engine loop would.
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

    /// Fire due timers and process the fallout.
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

    pub fn drain_push(&mut self) -> Vec<PushFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.push_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Carry this world's state into a fresh runtime over the same
    /// session adapter, as a daemon restart does.
    pub fn reincarnate(&self) -> World {
        let carried = self.runtime.state().lock().clone();
        let project = tempfile::tempdir().unwrap();
        let outputs = tempfile::tempdir().unwrap();
        let clock = self.clock.clone();
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (push_tx, push_rx) = broadcast::channel(1024);

        let mut config = EngineConfig::default();
        config.capture_tick = Duration::from_millis(20);
        let runtime = Runtime::new(RuntimeDeps {
            sessions: self.sessions.clone(),
            state: Arc::new(Mutex::new(carried)),
            outputs: Arc::new(OutputStore::open(outputs.path()).unwrap()),
            backends: BackendRegistry::with_default(Arc::new(ClaudeBackend::default())),
            clock: clock.clone(),
            config,
            event_tx,
            push_tx,
        });
        World {
            runtime,
            sessions: self.sessions.clone(),
            clock,
            event_rx,
            push_rx,
            project,
            _outputs: outputs,
        }
    }
}
