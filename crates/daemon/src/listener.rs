// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for socket I/O.
//!
//! Each connection carries one request/response exchange, except
//! `Subscribe`, which upgrades the connection to a stream of push frames.
//! Handlers never block the engine loop; mutations go through the runtime
//! and the event bus.

use std::sync::Arc;

use fleet_adapters::SessionAdapter;
use fleet_core::Clock;
use fleet_engine::{LimitedOp, RuntimeError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::env::{ipc_timeout, PROTOCOL_VERSION};
use crate::lifecycle::ListenCtx;
use crate::protocol::{read_message, write_message, DaemonStatus, ProtocolError, Request, Response};

pub struct Listener<S: SessionAdapter, C: Clock> {
    unix: UnixListener,
    ctx: Arc<ListenCtx<S, C>>,
}

impl<S: SessionAdapter, C: Clock> Listener<S, C> {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx<S, C>>) -> Self {
        Self { unix, ctx }
    }

    /// Accept loop; one task per connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => warn!("connection timed out"),
        other => error!(error = %other, "connection error"),
    }
}

async fn handle_connection<R, W, S, C>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx<S, C>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + AsyncReadExt + Unpin + Send + 'static,
    W: AsyncWrite + AsyncWriteExt + Unpin + Send + 'static,
    S: SessionAdapter,
    C: Clock,
{
    let request: Request = read_message(&mut reader, ipc_timeout()).await?;

    // Queries poll frequently; keep them at debug.
    match &request {
        Request::Ping | Request::Status | Request::WorkerList | Request::WorkerGet { .. } => {
            debug!(request = ?request, "received query")
        }
        other => info!(request = ?other, "received request"),
    }

    // Subscribe upgrades the connection; everything else is one exchange.
    if matches!(request, Request::Subscribe) {
        return stream_push_frames(reader, writer, ctx).await;
    }

    let response = dispatch(request, ctx).await;
    write_message(&mut writer, &response, ipc_timeout()).await
}

/// Stream push frames until the subscriber goes away. Lagging subscribers
/// lose frames (no replay) rather than back-pressuring publishers.
async fn stream_push_frames<R, W, S, C>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx<S, C>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + AsyncReadExt + Unpin,
    W: AsyncWrite + AsyncWriteExt + Unpin,
    S: SessionAdapter,
    C: Clock,
{
    let mut frames = ctx.runtime.subscribe_push();
    write_message(&mut writer, &Response::Subscribed, ipc_timeout()).await?;

    let mut closed = [0u8; 1];
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    write_message(&mut writer, &Response::Frame { frame }, ipc_timeout())
                        .await?;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "subscriber lagged; frames dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
            },
            // Subscribers never send again: a read means EOF/disconnect.
            _ = reader.read(&mut closed) => return Ok(()),
        }
    }
}

/// Per-caller key for rate limiting. Unix-socket peers are all local.
const CALLER: &str = "local";

async fn dispatch<S: SessionAdapter, C: Clock>(
    request: Request,
    ctx: &ListenCtx<S, C>,
) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => {
            Response::Hello { version: PROTOCOL_VERSION.to_string() }
        }

        Request::Status => {
            let (workers, running, pending) = {
                let state = ctx.state.lock();
                (
                    state.workers.len() + state.pending.len(),
                    state.running_count(),
                    state.pending.len(),
                )
            };
            Response::Status {
                status: DaemonStatus {
                    version: PROTOCOL_VERSION.to_string(),
                    uptime_s: ctx.start_time.elapsed().as_secs(),
                    workers,
                    running,
                    pending,
                    processed_seq: ctx.event_bus.processed_seq(),
                },
            }
        }

        Request::Shutdown { kill } => {
            if kill {
                // Sessions die before the shutdown signal so the teardown
                // finishes ahead of any CLI exit timer.
                let sessions: Vec<String> = {
                    let state = ctx.state.lock();
                    state.workers.values().map(|w| w.session.clone()).collect()
                };
                for session in sessions {
                    let _ = tokio::process::Command::new("tmux")
                        .args(["kill-session", "-t", &session])
                        .output()
                        .await;
                }
            }
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        Request::WorkerList => {
            let state = ctx.state.lock();
            let mut workers: Vec<_> =
                state.workers.values().chain(state.pending.values()).cloned().collect();
            workers.sort_by_key(|w| w.created_at_ms);
            Response::Workers { workers }
        }

        Request::WorkerGet { id } => match ctx.runtime.get_worker(&id) {
            Some(worker) => Response::Worker { worker: Box::new(worker) },
            None => not_found(&id),
        },

        Request::WorkerPending => {
            let state = ctx.state.lock();
            let mut workers: Vec<_> = state.pending.values().cloned().collect();
            workers.sort_by_key(|w| w.created_at_ms);
            Response::Pending { workers }
        }

        Request::WorkerSpawn { spec } => {
            if let Err(e) = ctx.limiter.check(CALLER, LimitedOp::Spawn, now()) {
                return rate_limited(e);
            }
            match ctx.runtime.spawn(spec).await {
                Ok(outcome) => Response::Spawned {
                    worker: Box::new(outcome.worker),
                    pending: outcome.pending,
                },
                Err(e) => error_response(e),
            }
        }

        Request::WorkerKill { id, force } => {
            if let Err(e) = ctx.limiter.check(CALLER, LimitedOp::Kill, now()) {
                return rate_limited(e);
            }
            match ctx.runtime.kill(&id, force).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }

        Request::WorkerInput { id, input } => {
            if let Err(e) = ctx.limiter.check(CALLER, LimitedOp::Input, now()) {
                return rate_limited(e);
            }
            if input.is_empty() {
                return Response::Error {
                    kind: "validation".into(),
                    message: "input must not be empty".into(),
                };
            }
            match ctx.runtime.send_input(&id, &input).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }

        Request::WorkerRawInput { id, keys } => {
            if let Err(e) = ctx.limiter.check(CALLER, LimitedOp::RawInput, now()) {
                return rate_limited(e);
            }
            if keys.is_empty() {
                return Response::Error {
                    kind: "validation".into(),
                    message: "keys must not be empty".into(),
                };
            }
            match ctx.runtime.send_raw(&id, &keys).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }

        Request::WorkerOutput { id } => match ctx.runtime.worker_output(&id) {
            Ok(text) => Response::Output { text },
            Err(e) => error_response(e),
        },

        Request::WorkerSettings { id, auto_accept, ralph_mode } => {
            if let Err(e) = ctx.limiter.check(CALLER, LimitedOp::Settings, now()) {
                return rate_limited(e);
            }
            match ctx.runtime.update_settings(&id, auto_accept, ralph_mode).await {
                Ok(worker) => Response::Worker { worker: Box::new(worker) },
                Err(e) => error_response(e),
            }
        }

        Request::WorkerComplete { id } => match ctx.runtime.complete(&id).await {
            Ok(outcome) => Response::Completed {
                worker: Box::new(outcome.worker),
                triggered: outcome.triggered.iter().map(|t| t.to_string()).collect(),
                on_complete: outcome.on_complete,
            },
            Err(e) => error_response(e),
        },

        Request::WorkerChildren { id } => match ctx.runtime.children_rollup(&id) {
            Ok(rollup) => Response::Children { rollup },
            Err(e) => error_response(e),
        },

        Request::WorkerSiblings { id } => match ctx.runtime.siblings(&id) {
            Ok(workers) => Response::Workers { workers },
            Err(e) => error_response(e),
        },

        Request::WorkerResize { id, cols, rows } => {
            if let Err(e) = ctx.limiter.check(CALLER, LimitedOp::Resize, now()) {
                return rate_limited(e);
            }
            match ctx.runtime.resize_worker(&id, cols, rows).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }

        Request::RalphSignal { token, signal } => {
            match ctx.runtime.ralph_signal(&token, signal).await {
                Ok(worker) => Response::Worker { worker: Box::new(worker) },
                Err(e) => error_response(e),
            }
        }

        Request::Diagnostics => Response::Diagnostics { report: ctx.runtime.diagnostics() },

        Request::Activity => {
            let state = ctx.state.lock();
            Response::Activity { entries: state.activity.entries().cloned().collect() }
        }

        // Intercepted in handle_connection before dispatch
        Request::Subscribe => Response::Subscribed,
    }
}

fn now() -> std::time::Instant {
    std::time::Instant::now()
}

fn not_found(id: &str) -> Response {
    Response::Error { kind: "not_found".into(), message: format!("worker not found: {id}") }
}

fn rate_limited(e: fleet_engine::ratelimit::RateLimited) -> Response {
    Response::Error { kind: "rate_limited".into(), message: e.to_string() }
}

/// Map runtime errors to sanitized protocol errors (no internal paths).
fn error_response(e: RuntimeError) -> Response {
    let kind = e.kind().to_string();
    let message = match &e {
        RuntimeError::Execute(_) | RuntimeError::Storage(_) => "internal error".to_string(),
        other => other.to_string(),
    };
    Response::Error { kind, message }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
