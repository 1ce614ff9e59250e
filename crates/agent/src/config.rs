// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration.

use std::net::SocketAddr;

/// Settings for one agent process.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Registry name, unique per master.
    pub name: String,
    /// Master address (host:port).
    pub master_addr: String,
    /// Port the execution listener binds.
    pub port: u16,
    /// Bind address for the execution listener.
    pub bind_address: String,
    /// Address reported to the master, when it differs from the bind
    /// address (NAT, container port mapping).
    pub report_address: Option<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, master_addr: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            master_addr: master_addr.into(),
            port,
            bind_address: "0.0.0.0".to_string(),
            report_address: None,
        }
    }

    /// Socket address the execution listener binds.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_address, self.port).parse()
    }

    /// Address registered with the master.
    pub fn advertised_address(&self) -> String {
        match &self.report_address {
            Some(addr) => addr.clone(),
            None => {
                let host = if self.bind_address == "0.0.0.0" {
                    "127.0.0.1"
                } else {
                    self.bind_address.as_str()
                };
                format!("{host}:{}", self.port)
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
