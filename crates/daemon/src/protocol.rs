// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. The
//! request set mirrors the control API one operation per variant; the HTTP
//! adapter in front of the daemon is a thin translation of these shapes.

use fleet_core::{ActivityEntry, RalphSignal, SpawnSpec, WorkerRecord};
use fleet_engine::{ChildrenRollup, PushFrame, SentinelReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Refuse messages beyond this size (defense against bad frames).
const MAX_MESSAGE_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message too large: {0} bytes")]
    TooLarge(u32),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timed out")]
    Timeout,
}

/// Request from a client to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Daemon status summary
    Status,

    /// Request daemon shutdown
    Shutdown {
        /// Kill all worker sessions before stopping
        #[serde(default)]
        kill: bool,
    },

    // -- workers --
    WorkerList,
    WorkerGet { id: String },
    WorkerSpawn { spec: SpawnSpec },
    WorkerKill {
        id: String,
        #[serde(default)]
        force: bool,
    },
    WorkerInput { id: String, input: String },
    WorkerRawInput { id: String, keys: String },
    WorkerOutput { id: String },
    WorkerSettings {
        id: String,
        #[serde(default)]
        auto_accept: Option<bool>,
        #[serde(default)]
        ralph_mode: Option<bool>,
    },
    WorkerComplete { id: String },
    WorkerChildren { id: String },
    WorkerSiblings { id: String },
    WorkerPending,
    WorkerResize { id: String, cols: u16, rows: u16 },

    // -- ralph --
    RalphSignal { token: String, signal: RalphSignal },

    // -- observability --
    Diagnostics,
    Activity,

    /// Upgrade this connection to a push-event stream.
    Subscribe,
}

/// Daemon status summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_s: u64,
    pub workers: usize,
    pub running: usize,
    pub pending: usize,
    pub processed_seq: u64,
}

/// Response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,
    Hello { version: String },
    Ok,
    Error {
        /// Stable kind: validation | capacity | not_found | rate_limited |
        /// session | internal
        kind: String,
        message: String,
    },
    Status { status: DaemonStatus },
    Worker { worker: Box<WorkerRecord> },
    Workers { workers: Vec<WorkerRecord> },
    Pending { workers: Vec<WorkerRecord> },
    Spawned {
        worker: Box<WorkerRecord>,
        pending: bool,
    },
    Completed {
        worker: Box<WorkerRecord>,
        triggered: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_complete: Option<fleet_core::OnComplete>,
    },
    Children { rollup: ChildrenRollup },
    Output { text: String },
    Diagnostics {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report: Option<SentinelReport>,
    },
    Activity { entries: Vec<ActivityEntry> },
    /// Subscription acknowledged; push frames follow on this connection.
    Subscribed,
    /// One push frame on a subscribed connection.
    Frame { frame: PushFrame },
    ShuttingDown,
}

/// Encode a message to JSON bytes (without the length prefix).
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

/// Decode a JSON message.
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed message.
pub async fn read_message<R, T>(reader: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    R: AsyncReadExt + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let read = async {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_MESSAGE_BYTES {
            return Err(ProtocolError::TooLarge(len));
        }
        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::ConnectionClosed
            } else {
                ProtocolError::Io(e)
            }
        })?;
        decode(&payload)
    };
    tokio::time::timeout(timeout, read).await.map_err(|_| ProtocolError::Timeout)?
}

/// Write one length-prefixed message.
pub async fn write_message<W, T>(
    writer: &mut W,
    message: &T,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let payload = encode(message)?;
    let len = payload.len() as u32;
    if len > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge(len));
    }
    let write = async {
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&payload).await?;
        writer.flush().await?;
        Ok(())
    };
    tokio::time::timeout(timeout, write).await.map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
