// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry-service client: the agent's side of the master connection.
//!
//! One connection per request. A failed dial or a timeout surfaces as a
//! transport error; an `unknown_agent` response tells the caller to
//! re-register.

use sloth_core::retry::CONNECT_TIMEOUT;
use sloth_wire::{
    read_frame, write_frame, ProtocolError, Request, RequestErrorKind, Response,
    DEFAULT_IPC_TIMEOUT, PROTOCOL_VERSION,
};
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum MasterClientError {
    #[error("transport error: {0}")]
    Transport(#[from] ProtocolError),

    #[error("dial {address} timed out")]
    DialTimeout { address: String },

    #[error("dial {address} failed: {message}")]
    DialFailed { address: String, message: String },

    #[error("master rejected request ({kind}): {message}")]
    Rejected { kind: RequestErrorKind, message: String },

    #[error("unexpected response from master")]
    UnexpectedResponse,
}

impl MasterClientError {
    /// The master does not know this agent; registration must be redone.
    pub fn is_unknown_agent(&self) -> bool {
        matches!(self, MasterClientError::Rejected { kind: RequestErrorKind::UnknownAgent, .. })
    }
}

/// Client for the master's registry service.
#[derive(Debug, Clone)]
pub struct MasterClient {
    address: String,
    auth_token: Option<String>,
}

impl MasterClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), auth_token: std::env::var("SLOTH_AUTH_TOKEN").ok() }
    }

    /// Send one request: dial, Hello handshake, request, response.
    pub async fn send(&self, request: Request) -> Result<Response, MasterClientError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.address))
            .await
            .map_err(|_| MasterClientError::DialTimeout { address: self.address.clone() })?
            .map_err(|e| MasterClientError::DialFailed {
                address: self.address.clone(),
                message: e.to_string(),
            })?;
        let (mut reader, mut writer) = stream.into_split();

        let hello = Request::Hello {
            version: PROTOCOL_VERSION.to_string(),
            token: self.auth_token.clone(),
        };
        write_frame(&mut writer, &hello, DEFAULT_IPC_TIMEOUT).await?;
        match read_frame::<Response, _>(&mut reader, DEFAULT_IPC_TIMEOUT).await? {
            Response::Hello { .. } => {}
            Response::Error { kind, message } => {
                return Err(MasterClientError::Rejected { kind, message })
            }
            _ => return Err(MasterClientError::UnexpectedResponse),
        }

        write_frame(&mut writer, &request, DEFAULT_IPC_TIMEOUT).await?;
        match read_frame::<Response, _>(&mut reader, DEFAULT_IPC_TIMEOUT).await? {
            Response::Error { kind, message } => {
                Err(MasterClientError::Rejected { kind, message })
            }
            response => Ok(response),
        }
    }

    /// Register this agent (upsert on the master).
    pub async fn register(
        &self,
        name: &str,
        address: &str,
        system_info: serde_json::Value,
    ) -> Result<(), MasterClientError> {
        let request = Request::AgentRegister {
            name: name.to_string(),
            address: address.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            system_info,
        };
        match self.send(request).await? {
            Response::AgentRegistered { .. } | Response::Ok => Ok(()),
            _ => Err(MasterClientError::UnexpectedResponse),
        }
    }

    /// One heartbeat.
    pub async fn heartbeat(&self, name: &str) -> Result<(), MasterClientError> {
        match self.send(Request::AgentHeartbeat { name: name.to_string() }).await? {
            Response::Ok => Ok(()),
            _ => Err(MasterClientError::UnexpectedResponse),
        }
    }
}
