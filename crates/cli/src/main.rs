// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet operator CLI.
//!
//! A thin client over the daemon socket protocol. Formatting only; all
//! behavior lives in the daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client::Client;
use fleet_core::{RalphSignal, SpawnSpec, WorkerId, WorkerRecord};
use fleet_daemon::{Request, Response};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fleet", version, about = "Operate a fleet of assistant workers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Spawn a worker in a project directory
    Spawn {
        /// Absolute path to the project directory
        project_path: PathBuf,
        #[arg(long)]
        label: Option<String>,
        /// Worker ids this worker depends on (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
        /// First input, sent after the session settles
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        backend: Option<String>,
        /// Auto-accept confirmation prompts
        #[arg(long)]
        auto_accept: bool,
        /// Issue a completion token and expect progress signals
        #[arg(long)]
        ralph: bool,
        /// Skip the auto-cleanup kill after completion
        #[arg(long)]
        keep_alive: bool,
    },
    /// List all workers
    Ls,
    /// List dependency-gated pending workers
    Pending,
    /// Show one worker
    Show { id: String },
    /// Kill a worker
    Kill {
        id: String,
        #[arg(long)]
        force: bool,
    },
    /// Send a line of input to a worker
    Send { id: String, input: Vec<String> },
    /// Send raw key names (tmux interpretation)
    Raw { id: String, keys: String },
    /// Print a worker's buffered output
    Output { id: String },
    /// Toggle per-worker settings
    Settings {
        id: String,
        #[arg(long)]
        auto_accept: Option<bool>,
        #[arg(long)]
        ralph_mode: Option<bool>,
    },
    /// Mark a worker completed (wakes dependents)
    Complete { id: String },
    /// Roll up a worker's children
    Children { id: String },
    /// List a worker's siblings
    Siblings { id: String },
    /// Resize a worker's session
    Resize { id: String, cols: u16, rows: u16 },
    /// Send a progress signal against a completion token
    Signal {
        token: String,
        #[arg(long, default_value = "in_progress")]
        status: String,
        #[arg(long)]
        progress: Option<f64>,
        #[arg(long)]
        step: Option<String>,
        #[arg(long)]
        learnings: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show the last Sentinel diagnostics report
    Diag,
    /// Show recent activity
    Activity,
    /// Daemon status
    Status,
    /// Stream push events to stdout
    Watch,
    /// Stop the daemon
    Shutdown {
        /// Also kill every worker session
        #[arg(long)]
        kill: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new()?;

    match cli.command {
        Command::Spawn {
            project_path,
            label,
            depends_on,
            input,
            parent,
            backend,
            auto_accept,
            ralph,
            keep_alive,
        } => {
            let spec = SpawnSpec {
                project_path,
                label,
                depends_on: depends_on.iter().map(|d| WorkerId::new(d.clone())).collect(),
                initial_input: input,
                parent: parent.map(WorkerId::new),
                backend,
                auto_accept,
                ralph_mode: ralph,
                keep_alive,
                ..Default::default()
            };
            match client.request(Request::WorkerSpawn { spec }).await? {
                Response::Spawned { worker, pending } => {
                    if pending {
                        println!("pending {} ({})", worker.id, worker.label);
                    } else {
                        println!("started {} in session {}", worker.id, worker.session);
                    }
                }
                other => fail(other)?,
            }
        }

        Command::Ls => match client.request(Request::WorkerList).await? {
            Response::Workers { workers } => print_workers(&workers),
            other => fail(other)?,
        },

        Command::Pending => match client.request(Request::WorkerPending).await? {
            Response::Pending { workers } => print_workers(&workers),
            other => fail(other)?,
        },

        Command::Show { id } => match client.request(Request::WorkerGet { id }).await? {
            Response::Worker { worker } => {
                println!("{}", serde_json::to_string_pretty(&worker)?)
            }
            other => fail(other)?,
        },

        Command::Kill { id, force } => {
            match client.request(Request::WorkerKill { id, force }).await? {
                Response::Ok => println!("killed"),
                other => fail(other)?,
            }
        }

        Command::Send { id, input } => {
            let input = input.join(" ");
            match client.request(Request::WorkerInput { id, input }).await? {
                Response::Ok => {}
                other => fail(other)?,
            }
        }

        Command::Raw { id, keys } => {
            match client.request(Request::WorkerRawInput { id, keys }).await? {
                Response::Ok => {}
                other => fail(other)?,
            }
        }

        Command::Output { id } => match client.request(Request::WorkerOutput { id }).await? {
            Response::Output { text } => print!("{text}"),
            other => fail(other)?,
        },

        Command::Settings { id, auto_accept, ralph_mode } => {
            match client
                .request(Request::WorkerSettings { id, auto_accept, ralph_mode })
                .await?
            {
                Response::Worker { worker } => {
                    println!(
                        "{}: autoAccept={} ralphMode={}",
                        worker.id, worker.auto_accept, worker.ralph_mode
                    )
                }
                other => fail(other)?,
            }
        }

        Command::Complete { id } => match client.request(Request::WorkerComplete { id }).await? {
            Response::Completed { worker, triggered, .. } => {
                println!("completed {}", worker.id);
                for id in triggered {
                    println!("triggered {id}");
                }
            }
            other => fail(other)?,
        },

        Command::Children { id } => {
            match client.request(Request::WorkerChildren { id }).await? {
                Response::Children { rollup } => {
                    println!("{}", serde_json::to_string_pretty(&rollup)?)
                }
                other => fail(other)?,
            }
        }

        Command::Siblings { id } => {
            match client.request(Request::WorkerSiblings { id }).await? {
                Response::Workers { workers } => print_workers(&workers),
                other => fail(other)?,
            }
        }

        Command::Resize { id, cols, rows } => {
            match client.request(Request::WorkerResize { id, cols, rows }).await? {
                Response::Ok => {}
                other => fail(other)?,
            }
        }

        Command::Signal { token, status, progress, step, learnings, reason } => {
            let signal = RalphSignal {
                status,
                progress,
                current_step: step,
                learnings,
                reason,
                ..Default::default()
            };
            match client.request(Request::RalphSignal { token, signal }).await? {
                Response::Worker { worker } => {
                    println!(
                        "{}: {}",
                        worker.id,
                        worker
                            .ralph_status
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "unsignaled".into())
                    )
                }
                other => fail(other)?,
            }
        }

        Command::Diag => match client.request(Request::Diagnostics).await? {
            Response::Diagnostics { report: Some(report) } => {
                println!("{}", serde_json::to_string_pretty(&report)?)
            }
            Response::Diagnostics { report: None } => println!("no sentinel report yet"),
            other => fail(other)?,
        },

        Command::Activity => match client.request(Request::Activity).await? {
            Response::Activity { entries } => {
                for entry in entries {
                    println!(
                        "{} {:?} {} ({}) {}",
                        entry.at_ms, entry.kind, entry.worker, entry.label, entry.message
                    );
                }
            }
            other => fail(other)?,
        },

        Command::Status => match client.request(Request::Status).await? {
            Response::Status { status } => {
                println!(
                    "fleetd {} up {}s: {} workers ({} running, {} pending), seq {}",
                    status.version,
                    status.uptime_s,
                    status.workers,
                    status.running,
                    status.pending,
                    status.processed_seq
                )
            }
            other => fail(other)?,
        },

        Command::Watch => {
            client
                .watch(|frame| {
                    println!("{} {}", frame.event, frame.data);
                })
                .await?
        }

        Command::Shutdown { kill } => {
            match client.request(Request::Shutdown { kill }).await? {
                Response::ShuttingDown => println!("daemon stopping"),
                other => fail(other)?,
            }
        }
    }
    Ok(())
}

fn print_workers(workers: &[WorkerRecord]) {
    for worker in workers {
        println!(
            "{}  {:<9}  {:<8}  {}  {}",
            worker.id, worker.status, worker.health, worker.project, worker.label
        );
    }
}

/// Turn an unexpected response (usually an error) into a CLI failure.
fn fail(response: Response) -> Result<()> {
    match response {
        Response::Error { kind, message } => bail!("{kind}: {message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
