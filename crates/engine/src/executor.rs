// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor.

use crate::scheduler::Scheduler;
use fleet_adapters::SessionAdapter;
use fleet_core::{Clock, Effect, Event};
use fleet_storage::MaterializedState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Webhook dispatch timeout.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("session error: {0}")]
    Session(#[from] fleet_adapters::SessionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event bus closed")]
    BusClosed,
    #[error("webhook error: {0}")]
    Webhook(String),
}

/// Executes effects through the configured adapters.
pub struct Executor<S, C: Clock> {
    sessions: S,
    state: Arc<Mutex<MaterializedState>>,
    scheduler: Arc<Mutex<Scheduler>>,
    clock: C,
    event_tx: mpsc::Sender<Event>,
    http: reqwest::Client,
}

impl<S, C> Executor<S, C>
where
    S: SessionAdapter,
    C: Clock,
{
    pub fn new(
        sessions: S,
        state: Arc<Mutex<MaterializedState>>,
        scheduler: Arc<Mutex<Scheduler>>,
        clock: C,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            sessions,
            state,
            scheduler,
            clock,
            event_tx,
            http: reqwest::Client::new(),
        }
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    /// Execute a batch, stopping at the first error.
    pub async fn execute_all(&self, effects: Vec<Effect>) -> Result<(), ExecuteError> {
        for effect in effects {
            self.execute(effect).await?;
        }
        Ok(())
    }

    /// Execute a single effect with tracing.
    pub async fn execute(&self, effect: Effect) -> Result<(), ExecuteError> {
        let name = effect.name();
        let span = tracing::info_span!("effect", effect = name);
        let _guard = span.enter();
        tracing::debug!(fields = ?effect.fields(), "executing");

        let result = self.execute_inner(effect).await;
        if let Err(e) = &result {
            tracing::error!(effect = name, error = %e, "effect failed");
        }
        result
    }

    async fn execute_inner(&self, effect: Effect) -> Result<(), ExecuteError> {
        match effect {
            Effect::Emit { event } => {
                // Idempotent events are applied immediately so the caller
                // reads its own writes; the bus re-applies them after the
                // WAL round-trip. Non-idempotent ones (input counters) wait
                // for the single bus application.
                if applies_now(&event) {
                    let mut state = self.state.lock();
                    state.apply_event(&event);
                }
                self.event_tx.send(event).await.map_err(|_| ExecuteError::BusClosed)
            }

            Effect::CreateSession { name, cwd, cols, rows, command } => {
                self.sessions.create(&name, &cwd, cols, rows, &command).await?;
                Ok(())
            }

            Effect::SendKeys { session, keys } => {
                self.sessions.send_keys(&session, &keys).await?;
                Ok(())
            }

            Effect::SendLiteral { session, text } => {
                self.sessions.send_literal(&session, &text).await?;
                Ok(())
            }

            Effect::SendEnter { session } => {
                self.sessions.send_enter(&session).await?;
                Ok(())
            }

            Effect::KillSession { session } => {
                self.sessions.kill(&session).await?;
                Ok(())
            }

            Effect::ResizeSession { session, cols, rows } => {
                self.sessions.resize(&session, cols, rows).await?;
                Ok(())
            }

            Effect::WriteContextFile { path, contents } => {
                tokio::fs::write(&path, contents).await?;
                Ok(())
            }

            Effect::RemoveContextFile { path } => {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }

            Effect::SetTimer { id, duration } => {
                let now = self.clock.now();
                self.scheduler.lock().set_timer(id, duration, now);
                Ok(())
            }

            Effect::CancelTimer { id } => {
                self.scheduler.lock().cancel_timer(&id);
                Ok(())
            }

            Effect::Webhook { url, method, headers, body } => {
                let method = method
                    .as_deref()
                    .unwrap_or("POST")
                    .parse::<reqwest::Method>()
                    .map_err(|e| ExecuteError::Webhook(e.to_string()))?;
                let mut request =
                    self.http.request(method, &url).timeout(WEBHOOK_TIMEOUT);
                for (key, value) in headers {
                    request = request.header(key, value);
                }
                if let Some(body) = body {
                    request = request.json(&body);
                }
                // Only the status matters; the body is dropped unread so a
                // hostile endpoint can't balloon memory.
                let response = request
                    .send()
                    .await
                    .map_err(|e| ExecuteError::Webhook(e.to_string()))?;
                let status = response.status();
                drop(response);
                if !status.is_success() {
                    return Err(ExecuteError::Webhook(format!("status {status}")));
                }
                Ok(())
            }
        }
    }
}

/// Whether an event may be applied immediately in addition to the single
/// bus application. Requires an idempotent state handler.
fn applies_now(event: &Event) -> bool {
    !matches!(event, Event::InputQueued { .. })
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
