// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket client for the fleet daemon.

use anyhow::{bail, Context, Result};
use fleet_daemon::{read_message, write_message, Request, Response};
use std::path::PathBuf;
use tokio::net::UnixStream;

pub struct Client {
    socket_path: PathBuf,
}

impl Client {
    /// Client against the daemon socket under the state directory.
    pub fn new() -> Result<Self> {
        let state_dir = fleet_daemon::env::state_dir()
            .context("could not determine the fleet state directory")?;
        Ok(Self { socket_path: state_dir.join("daemon.sock") })
    }

    /// One request/response exchange.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let mut stream = self.connect().await?;
        let timeout = fleet_daemon::env::ipc_timeout();
        write_message(&mut stream, &request, timeout).await?;
        let response = read_message(&mut stream, timeout).await?;
        Ok(response)
    }

    /// Subscribe and hand each push frame to `on_frame` until the daemon
    /// goes away.
    pub async fn watch(&self, mut on_frame: impl FnMut(fleet_daemon::PushFrame)) -> Result<()> {
        let mut stream = self.connect().await?;
        let timeout = fleet_daemon::env::ipc_timeout();
        write_message(&mut stream, &Request::Subscribe, timeout).await?;

        let ack: Response = read_message(&mut stream, timeout).await?;
        if !matches!(ack, Response::Subscribed) {
            bail!("unexpected subscription response");
        }
        loop {
            // Frames arrive whenever the fleet does something; no timeout.
            let frame: Response =
                read_message(&mut stream, std::time::Duration::from_secs(24 * 60 * 60)).await?;
            match frame {
                Response::Frame { frame } => on_frame(frame),
                Response::ShuttingDown => return Ok(()),
                _ => {}
            }
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.socket_path).await.with_context(|| {
            format!(
                "could not connect to fleetd at {} (is the daemon running?)",
                self.socket_path.display()
            )
        })
    }
}
