// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master client for the CLI.
//!
//! One connection per command: dial, Hello handshake, request, response.
//! When the master address is local and nothing answers, the client
//! auto-starts `slothd` and retries.

use crate::exit_error::ExitError;
use crate::master_process;
use sloth_wire::{
    read_frame, write_frame, Request, RequestErrorKind, Response, DEFAULT_IPC_TIMEOUT,
    PROTOCOL_VERSION,
};
use std::time::Duration;
use tokio::net::TcpStream;

/// Default master address, matching the daemon's default listen address.
pub const DEFAULT_MASTER_ADDR: &str = "127.0.0.1:50051";

/// Dial timeout for one attempt.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MasterClient {
    address: String,
    token: Option<String>,
    /// The user named a specific master; never auto-start one for them.
    explicit: bool,
}

impl MasterClient {
    /// Resolve the master address: `--master` flag, then
    /// `SLOTH_MASTER_ADDR`, then the default.
    pub fn new(flag: Option<String>) -> Self {
        let named = flag.or_else(|| std::env::var("SLOTH_MASTER_ADDR").ok());
        let explicit = named.is_some();
        let address = named.unwrap_or_else(|| DEFAULT_MASTER_ADDR.to_string());
        Self { address, token: std::env::var("SLOTH_AUTH_TOKEN").ok(), explicit }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one request, auto-starting a local master when nothing
    /// answers. `timeout` bounds the wait for the response (runs take as
    /// long as the workflow does).
    pub async fn send(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, ExitError> {
        match self.try_send(&request, timeout).await {
            Ok(response) => Ok(response),
            Err(first) => {
                if self.explicit || !self.is_local() || !master_process::try_start()? {
                    return Err(first);
                }
                self.try_send(&request, timeout).await
            }
        }
    }

    async fn try_send(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, ExitError> {
        let stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                ExitError::failure(format!("master at {} is not responding", self.address))
            })?
            .map_err(|e| {
                ExitError::failure(format!("cannot reach master at {}: {e}", self.address))
            })?;
        let (mut reader, mut writer) = stream.into_split();

        let hello =
            Request::Hello { version: PROTOCOL_VERSION.to_string(), token: self.token.clone() };
        write_frame(&mut writer, &hello, DEFAULT_IPC_TIMEOUT)
            .await
            .map_err(|e| ExitError::failure(e.to_string()))?;
        match read_frame::<Response, _>(&mut reader, DEFAULT_IPC_TIMEOUT)
            .await
            .map_err(|e| ExitError::failure(e.to_string()))?
        {
            Response::Hello { .. } => {}
            Response::Error { kind: RequestErrorKind::Unauthorized, message } => {
                return Err(ExitError::failure(format!("master refused connection: {message}")))
            }
            other => {
                return Err(ExitError::failure(format!("unexpected handshake: {other:?}")))
            }
        }

        write_frame(&mut writer, request, DEFAULT_IPC_TIMEOUT)
            .await
            .map_err(|e| ExitError::failure(e.to_string()))?;
        read_frame::<Response, _>(&mut reader, timeout)
            .await
            .map_err(|e| ExitError::failure(e.to_string()))
    }

    fn is_local(&self) -> bool {
        self.address.starts_with("127.0.0.1:") || self.address.starts_with("localhost:")
    }
}

/// Map an error response to an exit error; anything else passes through.
pub fn expect_ok(response: Response) -> Result<Response, ExitError> {
    match response {
        Response::Error { kind, message } => {
            let code = match kind {
                RequestErrorKind::Invalid => 2,
                _ => 1,
            };
            Err(ExitError::new(code, message))
        }
        other => Ok(other),
    }
}
