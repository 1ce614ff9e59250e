// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive payload transport.
//!
//! Workspaces and artifacts travel as tar blobs, optionally gzipped. The
//! kind is sniffed from magic bytes, never from file names. Blobs at or
//! below [`INLINE_ARCHIVE_MAX`] go as a single chunk message; larger blobs
//! are split into [`ARCHIVE_CHUNK_SIZE`] pieces, each its own
//! length-prefixed message following the JSON frame that announced them.

use crate::frame::{read_message, write_message, ProtocolError};
use serde::{Deserialize, Serialize};

/// Inline transfer threshold: archives up to this size ship as one message.
pub const INLINE_ARCHIVE_MAX: usize = 4 * 1024 * 1024;

/// Chunk size for large archives.
pub const ARCHIVE_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Content type of an archive blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    Tar,
    TarGz,
}

/// Announcement of an archive that follows on the stream as raw chunks.
///
/// A zero-length archive is complete in itself; no chunks follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub len: u64,
    pub kind: ArchiveKind,
}

impl ArchiveInfo {
    pub fn empty() -> Self {
        Self { len: 0, kind: ArchiveKind::Tar }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Sniff the archive kind from its first bytes.
///
/// Gzip magic is `1f 8b`; a POSIX tar header carries `ustar` at offset 257.
/// Short or unrecognised blobs default to plain tar.
pub fn sniff_archive_kind(bytes: &[u8]) -> ArchiveKind {
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        return ArchiveKind::TarGz;
    }
    if bytes.len() >= 262 && &bytes[257..262] == b"ustar" {
        return ArchiveKind::Tar;
    }
    ArchiveKind::Tar
}

/// Describe an archive blob for transport.
pub fn archive_info(bytes: &[u8]) -> ArchiveInfo {
    ArchiveInfo { len: bytes.len() as u64, kind: sniff_archive_kind(bytes) }
}

/// Write the raw chunks announced by an [`ArchiveInfo`].
pub async fn write_archive<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    for chunk in bytes.chunks(ARCHIVE_CHUNK_SIZE) {
        write_message(writer, chunk).await?;
    }
    Ok(())
}

/// Read the raw chunks announced by an [`ArchiveInfo`], reassembled.
pub async fn read_archive<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    info: &ArchiveInfo,
) -> Result<Vec<u8>, ProtocolError> {
    let expected = info.len as usize;
    let mut bytes = Vec::with_capacity(expected.min(INLINE_ARCHIVE_MAX));
    while bytes.len() < expected {
        let chunk = read_message(reader).await?;
        if chunk.is_empty() {
            return Err(ProtocolError::ConnectionClosed);
        }
        bytes.extend_from_slice(&chunk);
    }
    if bytes.len() != expected {
        return Err(ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("archive length mismatch: expected {expected}, got {}", bytes.len()),
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
