// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet daemon (fleetd).
//!
//! Background process that owns the engine loop and the worker fleet.
//!
//! Architecture:
//! - Listener task: socket I/O, emits events onto the bus
//! - Engine loop: main task processing durable events sequentially
//! - Capture loops: one task per running worker
//! - Periodic ticks: timers, health, cleanup, sentinel, sweeps

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod event_bus;
mod lifecycle;
mod listener;
mod protocol;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::Clock;
use fleet_storage::{Checkpointer, MaterializedState, Wal};
use parking_lot::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::event_bus::EventBus;
use crate::lifecycle::{Config, LifecycleError, StartupResult};
use crate::listener::Listener;

/// Group-commit flush cadence (durability window).
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Snapshot cadence.
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic cleanup cadence.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Ralph token sweep cadence.
const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Output store sweep cadence.
const OUTPUT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("fleetd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("fleetd {}", env!("CARGO_PKG_VERSION"));
                println!("Fleet daemon - orchestrates assistant workers in tmux sessions");
                println!();
                println!("USAGE:");
                println!("    fleetd");
                println!();
                println!("The daemon is typically started by the `fleet` CLI and should");
                println!("not be invoked directly. It listens on a Unix socket.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: fleetd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    rotate_log_if_needed(&config.log_path);
    let log_guard = setup_logging(&config)?;

    info!("starting fleet daemon");
    if let Some(url) = env::summarizer_url() {
        info!(url = %url, "summarizer endpoint configured");
    }

    let StartupResult { daemon, listener: unix_listener, mut event_reader, mut engine_rx } =
        match lifecycle::startup(&config) {
            Ok(result) => result,
            Err(LifecycleError::LockFailed(_)) => {
                let pid = std::fs::read_to_string(&config.lock_path)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                eprintln!("fleetd is already running");
                if !pid.is_empty() {
                    eprintln!("  pid: {pid}");
                }
                std::process::exit(1);
            }
            Err(e) => {
                error!(error = %e, "failed to start daemon");
                drop(log_guard);
                return Err(e.into());
            }
        };

    // Shutdown signal: never persisted, never replayed.
    let shutdown_notify = Arc::new(Notify::new());

    let ctx = Arc::new(lifecycle::ListenCtx {
        runtime: Arc::clone(&daemon.runtime),
        state: Arc::clone(&daemon.state),
        event_bus: daemon.event_bus.clone(),
        start_time: daemon.start_time,
        shutdown: Arc::clone(&shutdown_notify),
        limiter: fleet_engine::RateLimiter::new(),
    });
    tokio::spawn(Listener::new(unix_listener, ctx).run());

    spawn_flush_task(daemon.event_bus.clone());
    spawn_checkpoint(
        Arc::clone(&daemon.state),
        event_reader.wal(),
        daemon.config.snapshot_path.clone(),
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(socket = %config.socket_path.display(), "daemon ready");
    println!("READY");

    // Recovery runs in the background: the daemon answers queries while
    // sessions are reattached and orphans adopted.
    {
        let runtime = Arc::clone(&daemon.runtime);
        tokio::spawn(async move {
            if let Err(e) = runtime.restore().await {
                warn!(error = %e, "recovery failed");
            }
        });
    }

    // NOTE: intervals live outside the loop; select! re-evaluates branches
    // each iteration and would otherwise reset them on every event.
    let mut timer_check = tokio::time::interval(env::timer_check());
    let mut health_tick = tokio::time::interval(daemon.runtime.config().health_tick);
    let mut cleanup_tick = tokio::time::interval(CLEANUP_INTERVAL);
    let mut sentinel_tick = tokio::time::interval(daemon.runtime.config().sentinel_interval);
    let mut token_sweep = tokio::time::interval(TOKEN_SWEEP_INTERVAL);
    let mut output_sweep = tokio::time::interval(OUTPUT_SWEEP_INTERVAL);

    // Engine loop: durable events processed sequentially off the WAL.
    loop {
        tokio::select! {
            // Events produced by the runtime and capture loops.
            engine_event = engine_rx.recv() => {
                match engine_event {
                    Some(event) if event.is_durable() => {
                        if let Err(e) = daemon.event_bus.send(event) {
                            error!(error = %e, "failed to append event to WAL");
                        }
                    }
                    Some(_) => {}
                    None => {
                        info!("engine channel closed, shutting down");
                        break;
                    }
                }
            }

            result = event_reader.recv() => {
                match result {
                    Ok(Some(entry)) => {
                        let seq = entry.seq;
                        match entry.event {
                            fleet_core::Event::Shutdown => {
                                // Control signals are skipped on replay.
                                event_reader.mark_processed(seq);
                            }
                            event => {
                                if let Err(e) = daemon.process_event(event).await {
                                    // Unprocessable events must not wedge
                                    // the loop; they won't process later
                                    // either.
                                    error!(seq, error = %e, "error processing event");
                                }
                                event_reader.mark_processed(seq);
                            }
                        }
                    }
                    Ok(None) => {
                        info!("event bus closed, shutting down");
                        break;
                    }
                    Err(e) => error!(error = %e, "error reading from WAL"),
                }
            }

            _ = shutdown_notify.notified() => {
                info!("shutdown requested via command");
                break;
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }

            _ = timer_check.tick() => {
                let fired = {
                    let scheduler = daemon.runtime.scheduler();
                    let now = daemon.runtime.clock().now();
                    let mut guard = scheduler.lock();
                    guard.fired_timers(now)
                };
                for event in fired {
                    if let Err(e) = daemon.event_bus.send(event) {
                        error!(error = %e, "failed to enqueue timer event");
                    }
                }
            }

            _ = health_tick.tick() => {
                if let Err(e) = daemon.runtime.run_health_tick().await {
                    warn!(error = %e, "health tick failed");
                }
            }

            _ = cleanup_tick.tick() => {
                if let Err(e) = daemon.runtime.run_cleanup_tick().await {
                    warn!(error = %e, "cleanup tick failed");
                }
            }

            _ = sentinel_tick.tick() => {
                let report = daemon.runtime.run_sentinel().await;
                info!(status = ?report.status, issues = report.issues.len(),
                      warnings = report.warnings.len(), "sentinel report");
            }

            _ = token_sweep.tick() => {
                daemon.runtime.run_token_sweep();
            }

            _ = output_sweep.tick() => {
                daemon.runtime.run_output_sweep();
            }
        }
    }

    // Session kills for `shutdown --kill` already happened in the
    // listener; plain shutdown leaves sessions alive for reattach.
    daemon.shutdown(false).await?;
    info!("daemon stopped");
    Ok(())
}

/// Flush the event bus on the group-commit cadence.
fn spawn_flush_task(event_bus: EventBus) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            interval.tick().await;
            if event_bus.needs_flush() {
                if let Err(e) = event_bus.flush() {
                    error!(error = %e, "failed to flush event bus");
                }
            }
        }
    });
}

/// Periodic snapshots with WAL truncation once the snapshot is durable.
fn spawn_checkpoint(
    state: Arc<Mutex<MaterializedState>>,
    event_wal: Arc<Mutex<Wal>>,
    snapshot_path: PathBuf,
) {
    let checkpointer = Checkpointer::new(snapshot_path);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        loop {
            interval.tick().await;

            let (state_clone, processed_seq) = {
                let state_guard = state.lock();
                let wal_guard = event_wal.lock();
                (state_guard.clone(), wal_guard.processed_seq())
            };
            if processed_seq == 0 {
                continue;
            }

            let handle = checkpointer.start(processed_seq, &state_clone);
            let result = tokio::task::spawn_blocking(move || handle.wait()).await;
            match result {
                Ok(Ok(checkpoint)) => {
                    tracing::debug!(
                        seq = checkpoint.seq,
                        size_bytes = checkpoint.size_bytes,
                        "checkpoint complete"
                    );
                    // Snapshot durable: now the WAL may shrink.
                    let mut wal = event_wal.lock();
                    if let Err(e) = wal.truncate_before(processed_seq) {
                        warn!(error = %e, "failed to truncate WAL after checkpoint");
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "checkpoint failed, WAL not truncated"),
                Err(e) => warn!(error = %e, "checkpoint task panicked"),
            }
        }
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated log files kept (daemon.log.1 … .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Shift daemon.log → .1 → .2 → .3 when it grows too large. Best-effort.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }
    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let _ = std::fs::rename(format!("{log_str}.{i}"), format!("{log_str}.{}", i + 1));
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
