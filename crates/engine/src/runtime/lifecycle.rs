// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kill, complete, cleanup, health, and recovery paths.

use super::Runtime;
use crate::error::RuntimeError;
use fleet_adapters::SessionAdapter;
use fleet_core::{
    Clock, Effect, Event, OnComplete, TimerId, WorkerHealth, WorkerId, WorkerRecord, WorkerStatus,
};
use std::collections::HashMap;
use tracing::{info, warn};

/// Result of an explicit completion call. Stable across repeat calls:
/// the triggered set is the one recorded at first completion.
#[derive(Debug, Clone)]
pub struct CompleteOutcome {
    pub worker: WorkerRecord,
    /// Successors woken by this completion, in registration order.
    pub triggered: Vec<WorkerId>,
    pub on_complete: Option<OnComplete>,
}

impl<S, C> Runtime<S, C>
where
    S: SessionAdapter,
    C: Clock,
{
    /// Kill a worker: stop capture, tear the session down, clean up.
    /// Synchronous from the caller's view and idempotent per id (a second
    /// kill sees not-found).
    pub async fn kill(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let record = self.require_worker(id)?;

        // Pending workers have no session yet.
        let was_pending = record.status == WorkerStatus::Pending;
        if !was_pending {
            if let Some(output_session) = self.hub.stop(&record.id) {
                let _ = self.outputs.finalize(
                    &output_session,
                    "stopped",
                    self.clock.epoch_ms(),
                );
            }
            // Best-effort kill, then verify unless forced.
            let killed = self
                .executor
                .execute(Effect::KillSession { session: record.session.clone() })
                .await;
            if let Err(e) = killed {
                if force {
                    warn!(worker = %record.id, error = %e, "forced kill past session error");
                } else {
                    return Err(e.into());
                }
            }
            if !force {
                if let Ok(true) = self.sessions.has_session(&record.session).await {
                    return Err(RuntimeError::Session(
                        fleet_adapters::SessionError::CommandFailed(format!(
                            "session {} survived kill",
                            record.session
                        )),
                    ));
                }
            }
            self.executor
                .execute(Effect::RemoveContextFile { path: self.context_path_for(&record) })
                .await?;
        }

        self.emit(Event::WorkerDeleted { id: record.id.clone() }).await?;
        info!(worker = %record.id, pending = was_pending, "worker killed");
        Ok(())
    }

    /// Mark a worker completed, wake its dependents, dispatch on-complete.
    /// A second call is a no-op that replays the same triggered set.
    pub async fn complete(&self, id: &str) -> Result<CompleteOutcome, RuntimeError> {
        let record = self.require_worker(id)?;
        if record.status == WorkerStatus::Pending {
            return Err(RuntimeError::Validation(format!(
                "worker {id} has not started yet"
            )));
        }
        let now_ms = self.clock.epoch_ms();
        let repeat = record.status == WorkerStatus::Completed;

        let completion = self.graph.lock().mark_completed(&record.id);
        if repeat {
            // No-op: replay the recorded outcome without re-promoting or
            // re-dispatching the on-complete action.
            return Ok(CompleteOutcome {
                worker: record,
                triggered: completion.triggered,
                on_complete: completion.on_complete,
            });
        }
        self.emit(Event::WorkerCompleted { id: record.id.clone(), at_ms: now_ms }).await?;

        if !completion.triggered.is_empty() {
            self.emit(Event::DepsTriggered { triggered: completion.triggered.clone() })
                .await?;
        }
        for waiting in &completion.triggered {
            match self.promote(waiting).await {
                Ok(_) => {}
                Err(e) => {
                    warn!(worker = %waiting, error = %e, "promotion failed");
                }
            }
        }

        if let Some(action) = completion.on_complete.clone() {
            self.dispatch_on_complete(&record, action).await;
        }

        let worker = self.require_worker(id)?;
        Ok(CompleteOutcome {
            worker,
            triggered: completion.triggered,
            on_complete: completion.on_complete,
        })
    }

    /// Promote one pending worker to running. `None` when it is no longer
    /// pending (already promoted, killed, or failed by policy).
    pub(crate) async fn promote(
        &self,
        id: &WorkerId,
    ) -> Result<Option<WorkerRecord>, RuntimeError> {
        let pending = {
            let state = self.state.lock();
            state.pending.get(id).cloned()
        };
        let Some(mut record) = pending else {
            return Ok(None);
        };
        if !self.graph.lock().can_start(id) {
            return Ok(None);
        }
        self.emit(Event::DepsSatisfied { id: id.clone() }).await?;
        self.start_worker(&mut record).await?;
        Ok(Some(record))
    }

    async fn dispatch_on_complete(&self, source: &WorkerRecord, action: OnComplete) {
        match action {
            OnComplete::Spawn { options } => match self.spawn(*options).await {
                Ok(outcome) => {
                    info!(
                        source = %source.id,
                        spawned = %outcome.worker.id,
                        "on-complete spawn"
                    );
                }
                Err(e) => warn!(source = %source.id, error = %e, "on-complete spawn failed"),
            },
            OnComplete::Webhook { url, method, headers, body } => {
                let effect = Effect::Webhook { url, method, headers, body };
                if let Err(e) = self.executor.execute(effect).await {
                    warn!(source = %source.id, error = %e, "on-complete webhook failed");
                }
            }
            OnComplete::Emit { event, data } => {
                let _ = self.push_tx.send(crate::push::PushFrame::new(
                    event,
                    data.unwrap_or_else(|| {
                        serde_json::json!({ "workerId": source.id })
                    }),
                ));
            }
        }
    }

    /// `worker:stopped` side effects (capture noticed a vanished session,
    /// or the dependency-failure policy stopped a pending worker).
    pub(crate) async fn on_worker_stopped(
        &self,
        id: WorkerId,
        reason: String,
    ) -> Result<(), RuntimeError> {
        if let Some(output_session) = self.hub.stop(&id) {
            let _ = self.outputs.finalize(&output_session, "stopped", self.clock.epoch_ms());
        }
        // Stop is terminal here: remove the registry entry, as a kill would.
        let record = { self.state.lock().workers.get(&id).cloned() };
        if let Some(record) = record {
            info!(worker = %id, reason = %reason, "worker stopped");
            self.executor
                .execute(Effect::RemoveContextFile { path: self.context_path_for(&record) })
                .await?;
            self.emit(Event::WorkerDeleted { id }).await?;
        } else {
            // Pending worker stopped by policy: fail its successors too.
            info!(worker = %id, reason = %reason, "pending worker stopped");
            let blocked = self.graph.lock().mark_failed(&id);
            self.schedule_dep_grace(&blocked).await?;
            self.emit(Event::WorkerDeleted { id }).await?;
        }
        Ok(())
    }

    /// `worker:completed` side effects: finalize output, schedule cleanup.
    pub(crate) async fn on_worker_completed(
        &self,
        id: WorkerId,
        _at_ms: u64,
    ) -> Result<(), RuntimeError> {
        // Completion marking is idempotent; promotion after a crash is
        // handled by the recovery pass, not here.
        self.graph.lock().mark_completed(&id);

        if let Some(output_session) = self.hub.stop(&id) {
            let _ =
                self.outputs.finalize(&output_session, "completed", self.clock.epoch_ms());
        }
        let keep_alive = self
            .state
            .lock()
            .workers
            .get(&id)
            .map(|w| w.keep_alive)
            .unwrap_or(false);
        if !keep_alive {
            self.executor
                .execute(Effect::SetTimer {
                    id: TimerId::auto_cleanup(&id),
                    duration: self.config.auto_cleanup_delay,
                })
                .await?;
        }
        Ok(())
    }

    /// `worker:deleted` side effects: release every engine-side resource.
    pub(crate) async fn on_worker_deleted(&self, id: WorkerId) -> Result<(), RuntimeError> {
        if let Some(output_session) = self.hub.stop(&id) {
            let _ = self.outputs.finalize(&output_session, "stopped", self.clock.epoch_ms());
        }
        self.scheduler.lock().cancel_worker_timers(id.as_str());
        self.tokens.revoke_worker(&id);
        let blocked = self.graph.lock().remove(&id);
        self.schedule_dep_grace(&blocked).await?;
        Ok(())
    }

    /// Schedule the grace-then-fail policy for workers blocked on a failed
    /// dependency.
    pub(crate) async fn schedule_dep_grace(
        &self,
        blocked: &[WorkerId],
    ) -> Result<(), RuntimeError> {
        for worker in blocked {
            self.executor
                .execute(Effect::SetTimer {
                    id: TimerId::dep_grace(worker),
                    duration: self.config.dep_grace,
                })
                .await?;
        }
        Ok(())
    }

    /// Health monitor tick: classify every running worker.
    pub async fn run_health_tick(&self) -> Result<(), RuntimeError> {
        let now_ms = self.clock.epoch_ms();
        let grace_ms = self.config.capture_grace.as_millis() as u64;
        let stall_ms = self.config.stall_threshold.as_millis() as u64;

        let running: Vec<WorkerRecord> = {
            let state = self.state.lock();
            state
                .workers
                .values()
                .filter(|w| w.status == WorkerStatus::Running)
                .cloned()
                .collect()
        };

        for record in running {
            if now_ms.saturating_sub(record.created_at_ms) < grace_ms {
                continue;
            }
            let alive = self.sessions.has_session(&record.session).await.unwrap_or(false);
            let health = if !alive {
                WorkerHealth::Dead
            } else if now_ms.saturating_sub(record.last_output_ms) > stall_ms {
                WorkerHealth::Stalled
            } else {
                WorkerHealth::Healthy
            };
            if health == record.health {
                continue;
            }
            self.emit(Event::HealthChanged { id: record.id.clone(), health }).await?;
            if health == WorkerHealth::Dead {
                self.executor
                    .execute(Effect::SetTimer {
                        id: TimerId::dead_cleanup(&record.id),
                        duration: std::time::Duration::from_secs(30),
                    })
                    .await?;
            }
        }
        Ok(())
    }

    /// Periodic cleanup: kill completed workers past the delay, log
    /// long-inactive running workers (never kill them).
    pub async fn run_cleanup_tick(&self) -> Result<(), RuntimeError> {
        let now_ms = self.clock.epoch_ms();
        let delay_ms = self.config.auto_cleanup_delay.as_millis() as u64;
        let stale_ms = self.config.stale_worker_threshold.as_millis() as u64;

        let snapshot: Vec<WorkerRecord> =
            { self.state.lock().workers.values().cloned().collect() };

        for record in snapshot {
            match record.status {
                WorkerStatus::Completed if !record.keep_alive => {
                    let age = now_ms
                        .saturating_sub(record.completed_at_ms.unwrap_or(record.created_at_ms));
                    if age > delay_ms {
                        if let Err(e) = self.kill(record.id.as_str(), true).await {
                            warn!(worker = %record.id, error = %e, "cleanup kill failed");
                        }
                    }
                }
                WorkerStatus::Running => {
                    if now_ms.saturating_sub(record.last_activity_ms) > stale_ms {
                        warn!(
                            worker = %record.id,
                            label = %record.label,
                            "running worker inactive past threshold"
                        );
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Recovery after restart: reattach live sessions, drop dead entries,
    /// adopt orphan sessions, and promote pending workers whose
    /// dependencies were satisfied before the crash.
    pub async fn restore(&self) -> Result<(), RuntimeError> {
        let (mut registry, pending): (Vec<WorkerRecord>, Vec<WorkerRecord>) = {
            let state = self.state.lock();
            (
                state.workers.values().cloned().collect(),
                state.pending.values().cloned().collect(),
            )
        };
        // Register predecessors before successors.
        registry.sort_by_key(|r| r.created_at_ms);

        for record in &registry {
            self.register_in_graph(record);
            let mut graph = self.graph.lock();
            match record.status {
                WorkerStatus::Running => graph.mark_started(&record.id),
                WorkerStatus::Completed => {
                    graph.mark_started(&record.id);
                    graph.mark_completed(&record.id);
                }
                WorkerStatus::Stopped | WorkerStatus::Error => {
                    graph.mark_failed(&record.id);
                }
                WorkerStatus::Pending => {}
            }
        }
        for record in &pending {
            self.register_in_graph(record);
        }

        let mut reattached = 0usize;
        for record in &registry {
            if record.status != WorkerStatus::Running {
                continue;
            }
            if self.sessions.has_session(&record.session).await.unwrap_or(false) {
                // Zero activity so health doesn't immediately flag a stall.
                self.emit(Event::OutputObserved {
                    id: record.id.clone(),
                    at_ms: self.clock.epoch_ms(),
                })
                .await?;
                if let Some(token) = &record.ralph_token {
                    self.tokens.adopt(token.clone(), record.id.clone(), record.created_at_ms);
                }
                self.start_capture_for(record)?;
                reattached += 1;
            } else {
                // Session did not survive the restart: drop silently.
                self.emit(Event::WorkerDeleted { id: record.id.clone() }).await?;
            }
        }

        self.discover_sessions().await?;

        // Promote pending workers whose predecessors completed before the
        // crash (the completion event may have been processed without its
        // promotion finishing).
        let ready: Vec<WorkerId> = pending
            .iter()
            .map(|r| r.id.clone())
            .filter(|id| self.graph.lock().can_start(id))
            .collect();
        for id in ready {
            if let Err(e) = self.promote(&id).await {
                warn!(worker = %id, error = %e, "recovery promotion failed");
            }
        }

        info!(reattached, "recovery complete");
        Ok(())
    }

    /// Adopt prefix-matching sessions unknown to the registry.
    async fn discover_sessions(&self) -> Result<(), RuntimeError> {
        let sessions = match self.sessions.list_sessions().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "discovery skipped: cannot list sessions");
                return Ok(());
            }
        };
        let prefix = format!("{}-", self.config.session_prefix);
        let known: HashMap<String, WorkerId> = {
            let state = self.state.lock();
            state
                .workers
                .values()
                .map(|w| (w.session.clone(), w.id.clone()))
                .collect()
        };

        for session in sessions {
            if !session.starts_with(&prefix) || known.contains_key(&session) {
                continue;
            }
            let suffix = session.trim_start_matches(&prefix);
            if suffix.is_empty() || self.state.lock().contains(suffix) {
                continue;
            }
            let cwd = self.sessions.current_path(&session).await.unwrap_or_default();
            let cwd = if cwd.is_empty() { "/".to_string() } else { cwd };
            let label = std::path::Path::new(&cwd)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "adopted".to_string());

            let mut record = WorkerRecord::from_spec(
                WorkerId::new(suffix),
                session.clone(),
                &fleet_core::SpawnSpec {
                    project_path: std::path::PathBuf::from(&cwd),
                    label: Some(label),
                    ..Default::default()
                },
                self.clock.epoch_ms(),
            );
            record.status = WorkerStatus::Running;

            info!(session = %session, worker = %record.id, "adopting orphan session");
            self.register_in_graph(&record);
            self.graph.lock().mark_started(&record.id);
            self.emit(Event::WorkerCreated { worker: Box::new(record.clone()) }).await?;
            self.start_capture_for(&record)?;
        }
        Ok(())
    }
}
