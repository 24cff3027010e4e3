// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker capture loops.
//!
//! One task per running worker polls its pane, detects changes via a cheap
//! fingerprint, feeds the ring buffer and the output store, fans captured
//! chunks out to subscribers, and runs the auto-accept detector on every
//! tick. Loops are independent: one slow or failing session never blocks
//! the others.

use crate::auto_accept::{AutoAccept, AutoAcceptAction, AutoAcceptState};
use crate::push::PushFrame;
use fleet_adapters::{SessionAdapter, SessionError};
use fleet_core::{pane_fingerprint, Clock, Event, OutputRing, WorkerId, WorkerStatus};
use fleet_storage::{ChunkKind, MaterializedState, OutputStore};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct CaptureHandle {
    cancel: CancellationToken,
    ring: Arc<RwLock<OutputRing>>,
}

/// Registry of live capture loops and their buffers.
///
/// The worker → output-session mapping outlives the loop itself: a loop
/// that exits on its own (terminal status, vanished session) leaves the
/// mapping behind so the lifecycle handlers can still finalize the
/// session row. Only an explicit `stop` consumes it.
#[derive(Default)]
pub struct CaptureHub {
    handles: Mutex<HashMap<WorkerId, CaptureHandle>>,
    output_sessions: Mutex<HashMap<WorkerId, String>>,
}

impl CaptureHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a loop is running for this worker.
    pub fn is_running(&self, worker: &WorkerId) -> bool {
        self.handles.lock().contains_key(worker)
    }

    /// Snapshot of the worker's buffered output.
    pub fn output_snapshot(&self, worker: &WorkerId) -> Option<String> {
        let handles = self.handles.lock();
        handles.get(worker).map(|h| h.ring.read().snapshot().to_string())
    }

    /// Output-session id the worker's chunks are written under.
    pub fn output_session(&self, worker: &WorkerId) -> Option<String> {
        self.output_sessions.lock().get(worker).cloned()
    }

    /// Stop a worker's loop and consume its output-session id.
    pub fn stop(&self, worker: &WorkerId) -> Option<String> {
        if let Some(handle) = self.handles.lock().remove(worker) {
            handle.cancel.cancel();
        }
        self.output_sessions.lock().remove(worker)
    }

    /// Stop every loop (shutdown). Session mappings stay for finalization.
    pub fn stop_all(&self) {
        let mut handles = self.handles.lock();
        for (_, handle) in handles.drain() {
            handle.cancel.cancel();
        }
    }

    fn register(&self, worker: WorkerId, handle: CaptureHandle, output_session: String) -> bool {
        let mut handles = self.handles.lock();
        if handles.contains_key(&worker) {
            handle.cancel.cancel();
            return false;
        }
        handles.insert(worker.clone(), handle);
        self.output_sessions.lock().insert(worker, output_session);
        true
    }

    fn deregister(&self, worker: &WorkerId) {
        self.handles.lock().remove(worker);
    }
}

/// Everything a capture loop needs, cloned per worker.
pub struct CaptureDeps<S, C: Clock> {
    pub sessions: S,
    pub state: Arc<Mutex<MaterializedState>>,
    pub outputs: Arc<OutputStore>,
    pub event_tx: mpsc::Sender<Event>,
    pub push_tx: broadcast::Sender<PushFrame>,
    pub clock: C,
    pub tick: Duration,
    pub grace: Duration,
}

/// Start a capture loop for one worker. Returns false if a loop is
/// already running (recovery replay).
pub fn start_capture<S, C>(
    hub: &Arc<CaptureHub>,
    deps: CaptureDeps<S, C>,
    worker: WorkerId,
    session: String,
    output_session: String,
    auto_accept: AutoAccept,
) -> bool
where
    S: SessionAdapter,
    C: Clock,
{
    let cancel = CancellationToken::new();
    let ring = Arc::new(RwLock::new(OutputRing::default()));
    let handle = CaptureHandle { cancel: cancel.clone(), ring: Arc::clone(&ring) };
    if !hub.register(worker.clone(), handle, output_session.clone()) {
        return false;
    }

    let hub = Arc::clone(hub);
    tokio::spawn(async move {
        run_capture_loop(
            deps,
            &worker,
            &session,
            &output_session,
            ring,
            auto_accept,
            cancel,
        )
        .await;
        hub.deregister(&worker);
        debug!(worker = %worker, "capture loop stopped");
    });
    true
}

#[allow(clippy::too_many_arguments)]
async fn run_capture_loop<S, C>(
    deps: CaptureDeps<S, C>,
    worker: &WorkerId,
    session: &str,
    output_session: &str,
    ring: Arc<RwLock<OutputRing>>,
    auto_accept: AutoAccept,
    cancel: CancellationToken,
) where
    S: SessionAdapter,
    C: Clock,
{
    let started = deps.clock.now();
    let mut last_fingerprint: Option<u64> = None;
    let mut accept_state = AutoAcceptState::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(deps.tick) => {}
        }
        let in_grace = deps.clock.now().duration_since(started) < deps.grace;

        // Registry entry gone (or terminal): stop. During the startup
        // grace the entry may not have landed yet.
        let record = {
            let state = deps.state.lock();
            state.workers.get(worker).cloned()
        };
        let record = match record {
            Some(r) if r.status == WorkerStatus::Running => r,
            Some(_) => return,
            None if in_grace => continue,
            None => return,
        };

        let pane = match deps.sessions.capture(session).await {
            Ok(pane) => pane,
            Err(SessionError::NotFound(_)) if !in_grace => {
                // Session died out from under the worker.
                let _ = deps
                    .event_tx
                    .send(Event::WorkerStopped {
                        id: worker.clone(),
                        reason: "session vanished".to_string(),
                    })
                    .await;
                return;
            }
            Err(SessionError::NotFound(_)) => continue,
            Err(e) => {
                // Transient (timeout, circuit open): skip this tick.
                debug!(worker = %worker, error = %e, "capture tick failed");
                continue;
            }
        };

        let fingerprint = pane_fingerprint(&pane);
        if !pane.is_empty() && last_fingerprint != Some(fingerprint) {
            last_fingerprint = Some(fingerprint);
            ring.write().set(&pane);

            let at_ms = deps.clock.epoch_ms();
            if let Err(e) =
                deps.outputs.append_chunk(output_session, &pane, ChunkKind::Stdout, at_ms)
            {
                warn!(worker = %worker, error = %e, "failed to persist output chunk");
            }
            let _ = deps.push_tx.send(PushFrame::new(
                "worker:output",
                json!({ "workerId": worker, "chunk": pane, "at": at_ms }),
            ));
            let _ = deps
                .event_tx
                .send(Event::OutputObserved { id: worker.clone(), at_ms })
                .await;
        }

        // Auto-accept runs every tick, changed pane or not.
        let action =
            auto_accept.inspect(&pane, record.auto_accept, &mut accept_state, deps.clock.now());
        match action {
            AutoAcceptAction::None => {}
            AutoAcceptAction::Pause => {
                let _ = deps
                    .event_tx
                    .send(Event::AutoAcceptPaused { id: worker.clone(), paused: true })
                    .await;
            }
            AutoAcceptAction::Resume => {
                let _ = deps
                    .event_tx
                    .send(Event::AutoAcceptPaused { id: worker.clone(), paused: false })
                    .await;
            }
            AutoAcceptAction::Fire { hash } => {
                debug!(worker = %worker, hash, "auto-accepting prompt");
                if let Err(e) = deps.sessions.send_enter(session).await {
                    warn!(worker = %worker, error = %e, "auto-accept keystroke failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
