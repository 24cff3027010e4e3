// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime: the worker lifecycle coordinator.
//!
//! All registry mutations flow through events; the runtime validates
//! requests, drives the session adapter, owns the dependency graph and the
//! token map, and reacts to durable events coming back off the bus.

mod lifecycle;
mod spawn;
mod timer;

use crate::auto_accept::AutoAccept;
use crate::capture::{CaptureDeps, CaptureHub};
use crate::config::EngineConfig;
use crate::context;
use crate::deps::DependencyGraph;
use crate::error::RuntimeError;
use crate::executor::Executor;
use crate::push::{frames_for, PushFrame};
use crate::ralph::{rollup, ChildrenRollup, TokenRegistry};
use crate::scheduler::Scheduler;
use crate::sentinel::{Sentinel, SentinelInputs, SentinelReport};
use fleet_adapters::{Backend, BackendRegistry, CircuitBreaker, SessionAdapter};
use fleet_core::{Clock, Effect, Event, RalphSignal, WorkerId, WorkerRecord, WorkerStatus};
use fleet_storage::{MaterializedState, OutputStore};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

pub use lifecycle::CompleteOutcome;
pub use spawn::SpawnOutcome;

/// Adapter and storage dependencies for the runtime.
pub struct RuntimeDeps<S, C: Clock> {
    pub sessions: S,
    pub state: Arc<Mutex<MaterializedState>>,
    pub outputs: Arc<OutputStore>,
    pub backends: BackendRegistry,
    pub clock: C,
    pub config: EngineConfig,
    /// Durable events out (daemon forwards to the WAL-backed bus).
    pub event_tx: mpsc::Sender<Event>,
    /// Push frames out to subscribers.
    pub push_tx: broadcast::Sender<PushFrame>,
}

pub struct Runtime<S, C: Clock> {
    pub(crate) executor: Executor<S, C>,
    pub(crate) sessions: S,
    pub(crate) state: Arc<Mutex<MaterializedState>>,
    pub(crate) outputs: Arc<OutputStore>,
    pub(crate) backends: BackendRegistry,
    pub(crate) clock: C,
    pub(crate) config: EngineConfig,
    pub(crate) scheduler: Arc<Mutex<Scheduler>>,
    pub(crate) graph: Mutex<DependencyGraph>,
    pub(crate) tokens: TokenRegistry,
    pub(crate) hub: Arc<CaptureHub>,
    pub(crate) sentinel: Sentinel,
    pub(crate) event_tx: mpsc::Sender<Event>,
    pub(crate) push_tx: broadcast::Sender<PushFrame>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl<S, C> Runtime<S, C>
where
    S: SessionAdapter,
    C: Clock,
{
    pub fn new(deps: RuntimeDeps<S, C>) -> Self {
        let scheduler = Arc::new(Mutex::new(Scheduler::new()));
        let executor = Executor::new(
            deps.sessions.clone(),
            Arc::clone(&deps.state),
            Arc::clone(&scheduler),
            deps.clock.clone(),
            deps.event_tx.clone(),
        );
        Self {
            executor,
            sessions: deps.sessions,
            state: deps.state,
            outputs: deps.outputs,
            backends: deps.backends,
            clock: deps.clock,
            config: deps.config,
            scheduler,
            graph: Mutex::new(DependencyGraph::new()),
            tokens: TokenRegistry::new(),
            hub: Arc::new(CaptureHub::new()),
            sentinel: Sentinel::new(),
            event_tx: deps.event_tx,
            push_tx: deps.push_tx,
            breaker: None,
        }
    }

    /// Attach the session circuit breaker so Sentinel can report it.
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn state(&self) -> Arc<Mutex<MaterializedState>> {
        Arc::clone(&self.state)
    }

    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe_push(&self) -> broadcast::Receiver<PushFrame> {
        self.push_tx.subscribe()
    }

    /// Handle a durable event after it has been applied to state.
    /// Idempotent: crash recovery may redeliver unprocessed events.
    pub async fn handle_event(&self, event: Event) -> Result<(), RuntimeError> {
        match event {
            Event::WorkerCreated { worker } => self.on_worker_created(*worker).await,
            Event::WorkerPending { worker } => {
                self.register_in_graph(&worker);
                Ok(())
            }
            Event::WorkerStopped { id, reason } => self.on_worker_stopped(id, reason).await,
            Event::WorkerCompleted { id, at_ms } => self.on_worker_completed(id, at_ms).await,
            Event::WorkerDeleted { id } => self.on_worker_deleted(id).await,
            Event::TimerStart { id } => match id.kind() {
                Some(kind) => self.handle_timer(kind).await,
                None => {
                    warn!(timer = %id, "dropping unroutable timer");
                    Ok(())
                }
            },
            _ => Ok(()),
        }
    }

    /// Fan an applied event out to subscribers.
    pub fn publish(&self, event: &Event) {
        for frame in frames_for(event) {
            let _ = self.push_tx.send(frame);
        }
        // Child signals additionally notify the parent's scope.
        if let Event::RalphSignaled { id, update, .. } = event {
            let parent = {
                let state = self.state.lock();
                state.workers.get(id).and_then(|w| w.parent.clone())
            };
            if let Some(parent) = parent {
                let _ = self.push_tx.send(PushFrame::new(
                    "worker:child:signaled",
                    json!({ "parentWorkerId": parent, "workerId": id, "signal": update }),
                ));
            }
        }
    }

    /// Emit an event: apply-now (idempotent handlers) plus bus forward.
    pub(crate) async fn emit(&self, event: Event) -> Result<(), RuntimeError> {
        self.executor.execute(Effect::Emit { event }).await?;
        Ok(())
    }

    // === Queries and small mutations ===

    pub fn get_worker(&self, id: &str) -> Option<WorkerRecord> {
        self.state.lock().get_worker(id).cloned()
    }

    pub(crate) fn require_worker(&self, id: &str) -> Result<WorkerRecord, RuntimeError> {
        self.get_worker(id).ok_or_else(|| RuntimeError::WorkerNotFound(id.to_string()))
    }

    /// Roll up the children of a worker for parent polling.
    pub fn children_rollup(&self, id: &str) -> Result<ChildrenRollup, RuntimeError> {
        let state = self.state.lock();
        if state.get_worker(id).is_none() {
            return Err(RuntimeError::WorkerNotFound(id.to_string()));
        }
        Ok(rollup(&state.children_of(id), self.clock.epoch_ms()))
    }

    pub fn siblings(&self, id: &str) -> Result<Vec<WorkerRecord>, RuntimeError> {
        let state = self.state.lock();
        if state.get_worker(id).is_none() {
            return Err(RuntimeError::WorkerNotFound(id.to_string()));
        }
        Ok(state.siblings_of(id).into_iter().cloned().collect())
    }

    /// Live buffered output, falling back to the persistent store.
    pub fn worker_output(&self, id: &str) -> Result<String, RuntimeError> {
        let record = self.require_worker(id)?;
        if let Some(snapshot) = self.hub.output_snapshot(&record.id) {
            return Ok(snapshot);
        }
        let chunks = self.outputs.recent_chunks(&record.id, 50)?;
        Ok(chunks.into_iter().map(|c| c.content).collect::<Vec<_>>().join(""))
    }

    /// Queue a line of input to the worker's session.
    pub async fn send_input(&self, id: &str, input: &str) -> Result<(), RuntimeError> {
        let record = self.require_running(id)?;
        self.executor
            .execute_all(vec![
                Effect::SendLiteral { session: record.session.clone(), text: input.to_string() },
                Effect::SendEnter { session: record.session },
                Effect::Emit { event: Event::InputQueued { id: record.id } },
            ])
            .await?;
        Ok(())
    }

    /// Send raw key names (multiplexer interpretation).
    pub async fn send_raw(&self, id: &str, keys: &str) -> Result<(), RuntimeError> {
        let record = self.require_running(id)?;
        self.executor
            .execute_all(vec![
                Effect::SendKeys { session: record.session, keys: keys.to_string() },
                Effect::Emit { event: Event::InputQueued { id: record.id } },
            ])
            .await?;
        Ok(())
    }

    pub async fn resize_worker(
        &self,
        id: &str,
        cols: u16,
        rows: u16,
    ) -> Result<(), RuntimeError> {
        if cols == 0 || rows == 0 {
            return Err(RuntimeError::Validation("geometry must be non-zero".into()));
        }
        let record = self.require_running(id)?;
        self.executor
            .execute(Effect::ResizeSession { session: record.session, cols, rows })
            .await?;
        Ok(())
    }

    /// Toggle per-worker settings.
    pub async fn update_settings(
        &self,
        id: &str,
        auto_accept: Option<bool>,
        ralph_mode: Option<bool>,
    ) -> Result<WorkerRecord, RuntimeError> {
        if auto_accept.is_none() && ralph_mode.is_none() {
            return Err(RuntimeError::Validation("no settings provided".into()));
        }
        let record = self.require_worker(id)?;
        self.emit(Event::SettingsChanged { id: record.id.clone(), auto_accept, ralph_mode })
            .await?;
        self.require_worker(id)
    }

    /// Accept a Ralph signal against a completion token.
    pub async fn ralph_signal(
        &self,
        token: &str,
        signal: RalphSignal,
    ) -> Result<WorkerRecord, RuntimeError> {
        let now_ms = self.clock.epoch_ms();
        let worker =
            self.tokens.resolve(token, now_ms).ok_or(RuntimeError::TokenNotFound)?;
        let update = signal.sanitize();
        let terminal = update.status.is_terminal();
        self.emit(Event::RalphSignaled { id: worker.clone(), update, at_ms: now_ms }).await?;
        if terminal {
            self.tokens.consume(token);
        }
        self.require_worker(worker.as_str())
    }

    /// Run one Sentinel diagnostic pass.
    pub async fn run_sentinel(&self) -> SentinelReport {
        let backend_command = self.backends.default_backend().spawn_command();
        let expected = backend_command.split_whitespace().next().unwrap_or("").to_string();
        let inputs = SentinelInputs {
            state: &self.state,
            sessions: &self.sessions,
            breaker: self.breaker.as_ref().map(|b| b.snapshot(self.clock.now())),
            session_prefix: &self.config.session_prefix,
            backend_command: &expected,
            stall_after: self.config.stall_threshold,
        };
        self.sentinel.run(inputs, &self.clock).await
    }

    /// Most recent Sentinel report.
    pub fn diagnostics(&self) -> Option<SentinelReport> {
        self.sentinel.last()
    }

    /// Expired-token sweep (30 min cadence).
    pub fn run_token_sweep(&self) {
        let removed = self.tokens.sweep(self.clock.epoch_ms());
        if removed > 0 {
            tracing::info!(removed, "swept expired ralph tokens");
        }
    }

    /// Daily output-store sweep.
    pub fn run_output_sweep(&self) {
        match self
            .outputs
            .sweep(self.clock.epoch_ms(), self.config.output_retention_days)
        {
            Ok((removed, orphaned)) => {
                if removed > 0 || orphaned > 0 {
                    tracing::info!(removed, orphaned, "output store sweep");
                }
            }
            Err(e) => warn!(error = %e, "output store sweep failed"),
        }
    }

    /// Stop background work (daemon shutdown). Sessions stay alive so the
    /// next startup can reattach.
    pub fn shutdown(&self) {
        self.hub.stop_all();
    }

    // === Internals shared across handler files ===

    pub(crate) fn require_running(&self, id: &str) -> Result<WorkerRecord, RuntimeError> {
        let record = self.require_worker(id)?;
        if record.status != WorkerStatus::Running {
            return Err(RuntimeError::Validation(format!(
                "worker {id} is {}, not running",
                record.status
            )));
        }
        Ok(record)
    }

    /// Register a record in the dependency graph (idempotent; deps already
    /// cleaned up after completing are treated as satisfied).
    pub(crate) fn register_in_graph(&self, record: &WorkerRecord) {
        let known_deps: Vec<WorkerId> = {
            let state = self.state.lock();
            record
                .depends_on
                .iter()
                .filter(|dep| state.contains(dep.as_str()))
                .cloned()
                .collect()
        };
        let mut graph = self.graph.lock();
        if let Err(e) = graph.register(
            record.id.clone(),
            &known_deps,
            record.on_complete.clone(),
            record.workflow_id.clone(),
        ) {
            warn!(worker = %record.id, error = %e, "graph registration skipped");
        }
        if let (Some(workflow), Some(task)) = (&record.workflow_id, &record.task_id) {
            let _ = graph.register_worker_for_task(workflow, task, record.id.clone());
        }
    }

    /// Start the capture loop for a worker, opening its output session.
    pub(crate) fn start_capture_for(&self, record: &WorkerRecord) -> Result<(), RuntimeError> {
        if self.hub.is_running(&record.id) {
            return Ok(());
        }
        let now_ms = self.clock.epoch_ms();
        let output_session = format!("{}-{}", record.id, now_ms);
        self.outputs.open_session(fleet_storage::OutputSessionRow {
            session_id: output_session.clone(),
            worker: record.id.clone(),
            label: record.label.clone(),
            project: record.project.clone(),
            working_dir: record.project_path.clone(),
            task_description: record.task.as_ref().map(|t| t.description.clone()),
            started_at_ms: now_ms,
            ended_at_ms: None,
            final_status: None,
        })?;

        let backend = self
            .backends
            .get(Some(record.backend.as_str()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| self.backends.default_backend());
        let detector = AutoAccept::new(&backend.accept_patterns(), &backend.pause_keywords())
            .map_err(|e| RuntimeError::Validation(format!("bad accept patterns: {e}")))?;

        let deps = CaptureDeps {
            sessions: self.sessions.clone(),
            state: Arc::clone(&self.state),
            outputs: Arc::clone(&self.outputs),
            event_tx: self.event_tx.clone(),
            push_tx: self.push_tx.clone(),
            clock: self.clock.clone(),
            tick: self.config.capture_tick,
            grace: self.config.capture_grace,
        };
        crate::capture::start_capture(
            &self.hub,
            deps,
            record.id.clone(),
            record.session.clone(),
            output_session,
            detector,
        );
        Ok(())
    }

    /// Resolve a backend for a record.
    pub(crate) fn backend_for(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn Backend>, RuntimeError> {
        self.backends
            .get(name.filter(|n| !n.is_empty()))
            .ok_or_else(|| RuntimeError::BackendNotFound(name.unwrap_or("").to_string()))
    }

    /// Context-file path for a record's backend.
    pub(crate) fn context_path_for(&self, record: &WorkerRecord) -> std::path::PathBuf {
        let backend = self
            .backends
            .get(Some(record.backend.as_str()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| self.backends.default_backend());
        context::context_file_path(&record.project_path, backend.context_file_name())
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
