// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for master and agent communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//!
//! Two services share the framing:
//! - the registry service on the master (one request, one response per
//!   connection), spoken by agents and the CLI;
//! - the execution service on each agent, where the connection upgrades to
//!   an ordered frame stream after the request, with archive bytes carried
//!   as raw chunks between JSON frames.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod exec;
mod frame;
mod payload;
mod request;
mod response;
mod types;

pub use exec::{ExecErrorKind, ExecFrame, ExecRequest};
pub use frame::{
    decode, encode, read_frame, read_message, write_frame, write_message, ProtocolError,
    DEFAULT_IPC_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
pub use payload::{
    archive_info, read_archive, sniff_archive_kind, write_archive, ArchiveInfo, ArchiveKind,
    ARCHIVE_CHUNK_SIZE, INLINE_ARCHIVE_MAX,
};
pub use request::Request;
pub use response::{RequestErrorKind, Response};
pub use types::{
    AgentInfo, MasterStatus, RunReport, StackDetail, StackRef, StackSummary, TaskEnvelope,
    TaskReport, VersionSummary, WorkflowContext,
};
