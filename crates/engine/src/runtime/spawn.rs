// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn path: validation, dependency gating, session creation.

use super::Runtime;
use crate::context;
use crate::error::RuntimeError;
use fleet_adapters::SessionAdapter;
use fleet_core::{
    worker::validate_label, Clock, Effect, Event, SpawnSpec, TimerId, WorkerId, WorkerRecord,
    WorkerStatus,
};
use std::path::Path;
use tracing::info;

/// Result of a spawn request.
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub worker: WorkerRecord,
    /// True when the worker was queued behind incomplete dependencies.
    pub pending: bool,
}

impl<S, C> Runtime<S, C>
where
    S: SessionAdapter,
    C: Clock,
{
    /// Spawn a worker: validate, register dependencies, then either park it
    /// in the pending queue or bring a session up.
    pub async fn spawn(&self, spec: SpawnSpec) -> Result<SpawnOutcome, RuntimeError> {
        self.validate_spawn(&spec)?;

        {
            let state = self.state.lock();
            if state.running_count() >= self.config.max_concurrent {
                return Err(RuntimeError::Capacity(self.config.max_concurrent));
            }
        }

        let id = WorkerId::generate();
        let session = id.session_name(&self.config.session_prefix);
        let mut record =
            WorkerRecord::from_spec(id.clone(), session, &spec, self.clock.epoch_ms());
        record.backend = self.backend_for(spec.backend.as_deref())?.name().to_string();

        // Dependencies are validated and registered before anything starts;
        // a rejected registration leaves no trace of the allocated id.
        {
            let mut graph = self.graph.lock();
            graph.register(
                id.clone(),
                &spec.depends_on,
                spec.on_complete.clone(),
                spec.workflow_id.clone(),
            )?;
            if let (Some(workflow), Some(task)) = (&spec.workflow_id, &spec.task_id) {
                graph.register_worker_for_task(workflow, task, id.clone())?;
            }
        }

        let ready = self.graph.lock().can_start(&id);
        if !ready {
            self.emit(Event::WorkerPending { worker: Box::new(record.clone()) }).await?;
            info!(worker = %id, deps = record.depends_on.len(), "worker pending");
            return Ok(SpawnOutcome { worker: record, pending: true });
        }

        self.start_worker(&mut record).await?;
        Ok(SpawnOutcome { worker: record, pending: false })
    }

    /// Bring a worker up: token, context file, session, capture, timers.
    /// Shared by the spawn path and pending→running promotion.
    pub(crate) async fn start_worker(
        &self,
        record: &mut WorkerRecord,
    ) -> Result<(), RuntimeError> {
        let backend =
            self.backend_for(Some(record.backend.as_str()).filter(|b| !b.is_empty()))?;
        record.status = WorkerStatus::Running;

        if (record.ralph_mode || record.is_strategic()) && record.ralph_token.is_none() {
            record.ralph_token =
                Some(self.tokens.issue(record.id.clone(), self.clock.epoch_ms()));
        }

        // Context file lands before the backend starts so it is picked up
        // on first load.
        let context_path =
            context::context_file_path(&record.project_path, backend.context_file_name());
        self.executor
            .execute(Effect::WriteContextFile {
                path: context_path.clone(),
                contents: context::context_file_contents(
                    record,
                    &self.config.api_base,
                    &self.config.session_prefix,
                ),
            })
            .await?;

        let created = self
            .executor
            .execute(Effect::CreateSession {
                name: record.session.clone(),
                cwd: record.project_path.clone(),
                cols: self.config.cols,
                rows: self.config.rows,
                command: backend.spawn_command(),
            })
            .await;
        if let Err(e) = created {
            // Spawn-time failure: release everything the id touched.
            self.graph.lock().remove(&record.id);
            if let Some(token) = &record.ralph_token {
                self.tokens.consume(token);
            }
            let _ = self
                .executor
                .execute(Effect::RemoveContextFile { path: context_path })
                .await;
            return Err(e.into());
        }

        self.emit(Event::WorkerCreated { worker: Box::new(record.clone()) }).await?;
        self.graph.lock().mark_started(&record.id);
        self.start_capture_for(record)?;

        let mut effects = vec![Effect::SetTimer {
            id: TimerId::init_prompt(&record.id),
            duration: backend.init_delay(),
        }];
        if record.initial_input.is_some() {
            effects.push(Effect::SetTimer {
                id: TimerId::initial_input(&record.id),
                duration: backend.init_delay() + self.config.initial_input_delay,
            });
        }
        if record.ralph_mode {
            effects.push(Effect::SetTimer {
                id: TimerId::ralph_nudge(&record.id),
                duration: self.config.ralph_nudge_delay,
            });
        }
        self.executor.execute_all(effects).await?;

        info!(worker = %record.id, session = %record.session, "worker started");
        Ok(())
    }

    /// Post-apply side effects of `worker:created`. Safe to re-run on
    /// crash-replay: capture/start-marking/registration are all idempotent.
    pub(crate) async fn on_worker_created(
        &self,
        record: WorkerRecord,
    ) -> Result<(), RuntimeError> {
        self.register_in_graph(&record);
        let mut graph = self.graph.lock();
        graph.mark_started(&record.id);
        drop(graph);

        if record.status == WorkerStatus::Running && !self.hub.is_running(&record.id) {
            // Replay after a crash: the session may or may not have
            // survived. Only reattach capture when it did.
            if self.sessions.has_session(&record.session).await.unwrap_or(false) {
                self.start_capture_for(&record)?;
            }
        }
        Ok(())
    }

    fn validate_spawn(&self, spec: &SpawnSpec) -> Result<(), RuntimeError> {
        if let Some(label) = &spec.label {
            validate_label(label).map_err(RuntimeError::Validation)?;
        }
        if let Some(input) = &spec.initial_input {
            if input.len() > 64 * 1024 {
                return Err(RuntimeError::Validation("initial input too large".into()));
            }
        }
        self.backend_for(spec.backend.as_deref())?;
        self.validate_project_path(&spec.project_path)?;
        Ok(())
    }

    fn validate_project_path(&self, path: &Path) -> Result<(), RuntimeError> {
        if !path.is_absolute() {
            return Err(RuntimeError::Validation("project path must be absolute".into()));
        }
        let canonical = std::fs::canonicalize(path)
            .map_err(|_| RuntimeError::Validation("project path does not exist".into()))?;
        if !canonical.is_dir() {
            return Err(RuntimeError::Validation("project path is not a directory".into()));
        }
        if let Some(root) = &self.config.project_root {
            let root = std::fs::canonicalize(root)
                .map_err(|_| RuntimeError::Validation("configured root missing".into()))?;
            if !canonical.starts_with(&root) {
                return Err(RuntimeError::Validation(
                    "project path escapes the configured root".into(),
                ));
            }
        }
        Ok(())
    }
}
