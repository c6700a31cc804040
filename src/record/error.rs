// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Version record error types.

/// Errors that can occur while operating on a version record file.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("version {version} out of range [1, {capacity}]")]
    VersionOutOfRange { version: i32, capacity: u32 },

    #[error("new version {new} does not advance past expected {expected}")]
    VersionNotAdvancing { expected: i32, new: i32 },

    #[error("version record file is closed")]
    Closed,

    #[error("advisory lock failed: {0}")]
    Lock(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
