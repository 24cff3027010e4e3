// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, recovery wiring, shutdown.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fleet_adapters::{
    BackendRegistry, BreakerConfig, CircuitBreaker, ClaudeBackend, GuardedSessions, TmuxAdapter,
};
use fleet_core::{Event, SystemClock};
use fleet_engine::{PushFrame, Runtime, RuntimeDeps};
use fleet_storage::{load_snapshot, Checkpointer, MaterializedState, OutputStore, Wal};
use fs2::FileExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::{info, warn};

use crate::env;
use crate::event_bus::{EventBus, EventReader};

/// Daemon runtime with concrete adapter types.
pub type DaemonRuntime = Runtime<GuardedSessions<TmuxAdapter, SystemClock>, SystemClock>;

/// Filesystem layout under the state directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub outputs_path: PathBuf,
}

impl Config {
    /// Fixed paths under `~/.local/state/fleet` (or the env override).
    /// One daemon serves all projects for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir().ok_or(LifecycleError::NoStateDir)?;
        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.zst"),
            outputs_path: state_dir.join("outputs"),
            state_dir,
        })
    }
}

/// Running daemon state.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): held to keep the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub state: Arc<Mutex<MaterializedState>>,
    pub runtime: Arc<DaemonRuntime>,
    pub event_bus: EventBus,
    pub start_time: Instant,
}

/// Everything `startup` hands back to `main`.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
    pub event_reader: EventReader,
    /// Engine-side events (runtime + capture loops) to forward to the bus.
    pub engine_rx: mpsc::Receiver<Event>,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] fleet_storage::WalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] fleet_storage::SnapshotError),

    #[error("output store error: {0}")]
    Output(#[from] fleet_storage::OutputStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Bring the daemon up: lock, recover state, build the runtime, bind.
pub fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Exclusive instance lock with our pid inside.
    let lock_file = File::create(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    std::fs::write(&config.lock_path, format!("{}\n", std::process::id()))?;

    // Snapshot + WAL replay.
    let snapshot = load_snapshot(&config.snapshot_path)?;
    let (state, processed_seq) = match snapshot {
        Some(snapshot) => {
            info!(seq = snapshot.seq, "loaded snapshot");
            (snapshot.state, snapshot.seq)
        }
        None => (MaterializedState::default(), 0),
    };
    // Entries past the snapshot are unprocessed by definition: the engine
    // loop replays them (apply + side effects) once it starts.
    let wal = Wal::open(&config.wal_path, processed_seq)?;
    let unprocessed = wal.entries_after(processed_seq)?.len();
    if unprocessed > 0 {
        info!(unprocessed, "WAL entries will replay through the engine loop");
    }
    let (event_bus, event_reader) = EventBus::new(wal);

    let state = Arc::new(Mutex::new(state));
    let outputs = Arc::new(OutputStore::open(&config.outputs_path)?);

    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
    let sessions =
        GuardedSessions::new(TmuxAdapter::new(), Arc::clone(&breaker), SystemClock);

    let backends = BackendRegistry::with_default(Arc::new(ClaudeBackend::new(
        env::backend_command(),
    )));

    let (event_tx, engine_rx) = mpsc::channel(4096);
    let (push_tx, _) = broadcast::channel::<PushFrame>(4096);

    let runtime = Runtime::new(RuntimeDeps {
        sessions,
        state: Arc::clone(&state),
        outputs,
        backends,
        clock: SystemClock,
        config: env::engine_config(),
        event_tx,
        push_tx,
    })
    .with_breaker(breaker);

    // Stale socket from an unclean shutdown.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            state,
            runtime: Arc::new(runtime),
            event_bus,
            start_time: Instant::now(),
        },
        listener,
        event_reader,
        engine_rx,
    })
}

impl DaemonState {
    /// Process one durable event off the WAL: apply, handle, publish.
    pub async fn process_event(&self, event: Event) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            state.apply_event(&event);
        }
        self.runtime
            .handle_event(event.clone())
            .await
            .map_err(|e| LifecycleError::Runtime(e.to_string()))?;
        self.runtime.publish(&event);
        Ok(())
    }

    /// Graceful shutdown. Worker sessions are left alive so the next
    /// startup reattaches; `kill_sessions` tears them down first.
    pub async fn shutdown(&self, kill_sessions: bool) -> Result<(), LifecycleError> {
        info!("shutting down daemon");
        self.runtime.shutdown();

        if kill_sessions {
            let workers: Vec<String> = {
                let state = self.state.lock();
                state.workers.values().map(|w| w.session.clone()).collect()
            };
            let count = workers.len();
            for session in workers {
                let _ = tokio::process::Command::new("tmux")
                    .args(["kill-session", "-t", &session])
                    .output()
                    .await;
            }
            info!(count, "killed worker sessions on shutdown");
        }

        if let Err(e) = self.event_bus.flush() {
            warn!(error = %e, "failed to flush WAL on shutdown");
        }

        // Final snapshot so the next startup skips the replay.
        let processed_seq = self.event_bus.processed_seq();
        if processed_seq > 0 {
            let state_clone = self.state.lock().clone();
            let checkpointer = Checkpointer::new(self.config.snapshot_path.clone());
            match checkpointer.checkpoint_sync(processed_seq, &state_clone) {
                Ok(result) => {
                    info!(seq = result.seq, size_bytes = result.size_bytes, "final snapshot")
                }
                Err(e) => warn!(error = %e, "failed to save shutdown snapshot"),
            }
        }

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Shared context for request handlers. Generic over the adapter and
/// clock so listener tests can drive a fake session world.
pub struct ListenCtx<S: fleet_adapters::SessionAdapter, C: fleet_core::Clock> {
    pub runtime: Arc<Runtime<S, C>>,
    pub state: Arc<Mutex<MaterializedState>>,
    pub event_bus: EventBus,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
    pub limiter: fleet_engine::RateLimiter,
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
