// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Manager error types.

use std::path::PathBuf;

use crate::db::SnapshotError;

/// Errors surfaced by the multi-database manager.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("data directory is not a directory: {}", path.display())]
    DataDirNotDirectory { path: PathBuf },

    #[error("database name must be non-blank and free of path separators: {0:?}")]
    InvalidName(String),

    #[error("database error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
