// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fired-timer dispatch.

use super::Runtime;
use crate::context;
use crate::error::RuntimeError;
use fleet_adapters::SessionAdapter;
use fleet_core::{Clock, Effect, Event, RalphStatus, TimerKind, WorkerStatus};
use tracing::debug;

impl<S, C> Runtime<S, C>
where
    S: SessionAdapter,
    C: Clock,
{
    pub(crate) async fn handle_timer(&self, kind: TimerKind) -> Result<(), RuntimeError> {
        match kind {
            TimerKind::InitPrompt(worker) => {
                let Some(record) = self.get_worker(worker.as_str()) else {
                    return Ok(());
                };
                if record.status != WorkerStatus::Running {
                    return Ok(());
                }
                let prompt = context::self_awareness_prompt(&record, &self.config.api_base);
                self.executor
                    .execute_all(vec![
                        Effect::SendLiteral { session: record.session.clone(), text: prompt },
                        Effect::SendEnter { session: record.session },
                    ])
                    .await?;
                Ok(())
            }

            TimerKind::InitialInput(worker) => {
                let Some(record) = self.get_worker(worker.as_str()) else {
                    return Ok(());
                };
                let Some(input) = record.initial_input.clone() else {
                    return Ok(());
                };
                if record.status != WorkerStatus::Running {
                    return Ok(());
                }
                self.executor
                    .execute_all(vec![
                        Effect::SendLiteral { session: record.session.clone(), text: input },
                        Effect::SendEnter { session: record.session.clone() },
                        Effect::Emit { event: Event::InputQueued { id: record.id } },
                    ])
                    .await?;
                Ok(())
            }

            TimerKind::RalphNudge(worker) => {
                let Some(record) = self.get_worker(worker.as_str()) else {
                    return Ok(());
                };
                let signaled = !matches!(
                    record.ralph_status,
                    None | Some(RalphStatus::Pending)
                );
                if signaled || record.status != WorkerStatus::Running {
                    return Ok(());
                }
                debug!(worker = %record.id, "nudging silent ralph worker");
                let nudge = context::ralph_nudge(&record, &self.config.api_base);
                self.executor
                    .execute_all(vec![
                        Effect::SendLiteral { session: record.session.clone(), text: nudge },
                        Effect::SendEnter { session: record.session },
                    ])
                    .await?;
                Ok(())
            }

            TimerKind::AutoCleanup(worker) => {
                let Some(record) = self.get_worker(worker.as_str()) else {
                    return Ok(());
                };
                if record.status == WorkerStatus::Completed && !record.keep_alive {
                    self.kill(worker.as_str(), true).await?;
                }
                Ok(())
            }

            TimerKind::DeadCleanup(worker) => {
                if self.get_worker(worker.as_str()).is_none() {
                    return Ok(());
                }
                self.kill(worker.as_str(), true).await
            }

            TimerKind::DepGrace(worker) => {
                let still_pending =
                    { self.state.lock().pending.contains_key(&worker) };
                if !still_pending {
                    return Ok(());
                }
                if self.graph.lock().can_start(&worker) {
                    // Late recovery: the failure resolved another way.
                    return Ok(());
                }
                if self.graph.lock().has_failed_dependency(&worker) {
                    self.emit(Event::WorkerStopped {
                        id: worker.clone(),
                        reason: "dependency failed".to_string(),
                    })
                    .await?;
                }
                Ok(())
            }
        }
    }
}
