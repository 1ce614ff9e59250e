// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory archiving for workspace and artifact transport.
//!
//! Packing always produces plain tar; unpacking accepts plain or gzipped
//! tar, sniffed from magic bytes. Entry paths are confined to the target
//! directory (the tar crate refuses absolute and parent-escaping paths on
//! unpack).

use flate2::read::GzDecoder;
use sloth_wire::{sniff_archive_kind, ArchiveKind};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pack a directory's contents into a tar blob.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder.append_dir_all(".", dir)?;
    Ok(builder.into_inner()?)
}

/// Unpack a tar (or gzipped tar) blob into a directory, created if needed.
pub fn unpack_into(bytes: &[u8], dir: &Path) -> Result<(), ArchiveError> {
    std::fs::create_dir_all(dir)?;
    if bytes.is_empty() {
        return Ok(());
    }
    match sniff_archive_kind(bytes) {
        ArchiveKind::Tar => tar::Archive::new(bytes).unpack(dir)?,
        ArchiveKind::TarGz => tar::Archive::new(GzDecoder::new(bytes)).unpack(dir)?,
    }
    Ok(())
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
