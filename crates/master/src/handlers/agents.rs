// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry handlers.

use crate::listener::MasterCtx;
use crate::registry::Resolution;
use sloth_core::retry::CONNECT_TIMEOUT;
use sloth_core::AgentStatus;
use sloth_wire::{
    read_frame, write_frame, ExecFrame, ExecRequest, RequestErrorKind, Response,
    DEFAULT_IPC_TIMEOUT,
};
use tokio::net::TcpStream;

fn internal(e: impl std::fmt::Display) -> Response {
    Response::error(RequestErrorKind::Internal, e.to_string())
}

pub fn register(
    ctx: &MasterCtx,
    name: &str,
    address: &str,
    version: &str,
    system_info: serde_json::Value,
) -> Response {
    match ctx.registry.register(name, address, version, system_info) {
        Ok(()) => Response::AgentRegistered { name: name.to_string() },
        Err(e) => internal(e),
    }
}

pub fn heartbeat(ctx: &MasterCtx, name: &str) -> Response {
    match ctx.registry.heartbeat(name) {
        // Unknown name: tell the agent so it can re-register.
        Ok(false) => Response::error(
            RequestErrorKind::UnknownAgent,
            format!("agent {name:?} is not registered"),
        ),
        Ok(true) => Response::Ok,
        Err(e) => internal(e),
    }
}

pub fn list(ctx: &MasterCtx, status: Option<&str>) -> Response {
    let filter = match status {
        None => None,
        Some("active") => Some(AgentStatus::Active),
        Some("inactive") => Some(AgentStatus::Inactive),
        Some("unknown") => Some(AgentStatus::Unknown),
        Some(other) => {
            return Response::error(
                RequestErrorKind::Invalid,
                format!("unknown status filter {other:?}"),
            )
        }
    };
    Response::Agents { agents: ctx.registry.list(filter) }
}

pub fn resolve(ctx: &MasterCtx, name: &str) -> Response {
    match ctx.registry.resolve(name) {
        Resolution::Address(address) => {
            Response::AgentAddress { name: name.to_string(), address }
        }
        Resolution::NotFound => Response::error(
            RequestErrorKind::NotFound,
            format!("agent {name:?} not found"),
        ),
        Resolution::Inactive => Response::error(
            RequestErrorKind::Inactive,
            format!("agent {name:?} is inactive"),
        ),
    }
}

pub fn mark_inactive(ctx: &MasterCtx, name: &str, reason: &str) -> Response {
    match ctx.registry.mark_inactive(name, reason) {
        Ok(()) => Response::Ok,
        Err(e) => internal(e),
    }
}

pub fn remove(ctx: &MasterCtx, name: &str) -> Response {
    match ctx.registry.remove(name) {
        Ok(true) => Response::Ok,
        Ok(false) => Response::error(
            RequestErrorKind::NotFound,
            format!("agent {name:?} not found"),
        ),
        Err(e) => internal(e),
    }
}

/// Relay an update RPC to an agent's execution service.
pub async fn update(ctx: &MasterCtx, name: &str, target_version: &str) -> Response {
    let address = match ctx.registry.resolve(name) {
        Resolution::Address(address) => address,
        Resolution::Inactive => {
            return Response::error(
                RequestErrorKind::Inactive,
                format!("agent {name:?} is inactive"),
            )
        }
        Resolution::NotFound => {
            return Response::error(
                RequestErrorKind::NotFound,
                format!("agent {name:?} not found"),
            )
        }
    };

    let request =
        ExecRequest::UpdateAgent { target_version: target_version.to_string() };
    match exchange_one(&address, &request).await {
        Ok(ExecFrame::UpdateResult { ok: true, restart_required }) => {
            Response::AgentUpdated { name: name.to_string(), restart_required }
        }
        Ok(ExecFrame::UpdateResult { ok: false, .. }) => {
            Response::error(RequestErrorKind::Internal, "agent declined the update")
        }
        Ok(other) => {
            Response::error(RequestErrorKind::Internal, format!("unexpected frame: {other:?}"))
        }
        Err(message) => Response::error(RequestErrorKind::Internal, message),
    }
}

/// One request/one frame against an agent's execution service.
async fn exchange_one(address: &str, request: &ExecRequest) -> Result<ExecFrame, String> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| format!("dial {address} timed out"))?
        .map_err(|e| format!("dial {address} failed: {e}"))?;
    let (mut reader, mut writer) = stream.into_split();
    write_frame(&mut writer, request, DEFAULT_IPC_TIMEOUT)
        .await
        .map_err(|e| e.to_string())?;
    read_frame::<ExecFrame, _>(&mut reader, DEFAULT_IPC_TIMEOUT)
        .await
        .map_err(|e| e.to_string())
}

/// Send a shutdown RPC to an agent's execution service.
pub async fn stop(ctx: &MasterCtx, name: &str) -> Response {
    let address = match ctx.registry.resolve(name) {
        Resolution::Address(address) => address,
        other => {
            return match other {
                Resolution::Inactive => Response::error(
                    RequestErrorKind::Inactive,
                    format!("agent {name:?} is inactive"),
                ),
                _ => Response::error(
                    RequestErrorKind::NotFound,
                    format!("agent {name:?} not found"),
                ),
            }
        }
    };

    let request = ExecRequest::Shutdown { reason: "stopped by master".to_string() };
    match exchange_one(&address, &request).await {
        Ok(ExecFrame::Ok) => {
            // The agent is going away on purpose; reflect that now rather
            // than waiting for the sweep.
            let _ = ctx.registry.mark_inactive(name, "stopped");
            Response::Ok
        }
        Ok(other) => {
            Response::error(RequestErrorKind::Internal, format!("unexpected frame: {other:?}"))
        }
        Err(message) => Response::error(RequestErrorKind::Internal, message),
    }
}
