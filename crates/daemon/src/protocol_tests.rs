// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::{SpawnSpec, WorkerId, WorkerRecord};
use std::path::PathBuf;

fn record() -> WorkerRecord {
    let id = WorkerId::new("ab12cd34");
    let spec = SpawnSpec { project_path: PathBuf::from("/p/acme"), ..Default::default() };
    WorkerRecord::from_spec(id.clone(), id.session_name("fleet"), &spec, 1000)
}

#[test]
fn request_serde_round_trips() {
    let requests = vec![
        Request::Ping,
        Request::Hello { version: "0.1.0".into() },
        Request::WorkerList,
        Request::WorkerSpawn {
            spec: SpawnSpec {
                project_path: PathBuf::from("/p/acme"),
                label: Some("TEST".into()),
                ..Default::default()
            },
        },
        Request::WorkerKill { id: "ab12cd34".into(), force: true },
        Request::WorkerInput { id: "ab12cd34".into(), input: "echo hi".into() },
        Request::RalphSignal {
            token: "tok1234567".into(),
            signal: fleet_core::RalphSignal { status: "done".into(), ..Default::default() },
        },
        Request::Subscribe,
        Request::Shutdown { kill: false },
    ];
    for request in requests {
        let bytes = encode(&request).unwrap();
        let back: Request = decode(&bytes).unwrap();
        assert_eq!(back, request);
    }
}

#[test]
fn kill_force_defaults_to_false() {
    let back: Request =
        serde_json::from_str(r#"{"type":"WorkerKill","id":"ab12cd34"}"#).unwrap();
    assert_eq!(back, Request::WorkerKill { id: "ab12cd34".into(), force: false });
}

#[test]
fn response_carries_worker_payload() {
    let response = Response::Spawned { worker: Box::new(record()), pending: false };
    let bytes = encode(&response).unwrap();
    let back: Response = decode(&bytes).unwrap();
    match back {
        Response::Spawned { worker, pending } => {
            assert_eq!(worker.id, "ab12cd34");
            assert!(!pending);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn wire_round_trip_over_a_duplex_pipe() {
    let (mut client, mut server) = tokio::io::duplex(4096);
    let timeout = Duration::from_secs(1);

    write_message(&mut client, &Request::Ping, timeout).await.unwrap();
    let request: Request = read_message(&mut server, timeout).await.unwrap();
    assert_eq!(request, Request::Ping);

    write_message(&mut server, &Response::Pong, timeout).await.unwrap();
    let response: Response = read_message(&mut client, timeout).await.unwrap();
    assert!(matches!(response, Response::Pong));
}

#[tokio::test]
async fn oversized_frame_is_refused() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let timeout = Duration::from_millis(200);

    // Hand-write a length prefix claiming 32 MiB.
    let len: u32 = 32 * 1024 * 1024;
    tokio::io::AsyncWriteExt::write_all(&mut client, &len.to_be_bytes()).await.unwrap();

    let err = read_message::<_, Request>(&mut server, timeout).await.unwrap_err();
    assert!(matches!(err, ProtocolError::TooLarge(_)));
}

#[tokio::test]
async fn closed_connection_reports_cleanly() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);
    let err = read_message::<_, Request>(&mut server, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn read_times_out_without_data() {
    let (_client, mut server) = tokio::io::duplex(64);
    let err = read_message::<_, Request>(&mut server, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout));
}
