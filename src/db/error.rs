// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Database error types.

use crate::engine::EngineError;
use crate::record::RecordError;

/// Errors surfaced by database construction and the write path.
///
/// Read paths never return these; they absorb failures and report
/// absence instead.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("database name must be non-blank and free of path separators: {0:?}")]
    InvalidName(String),

    #[error("all {capacity} version slots are used; no further snapshot can be published")]
    CapacityExhausted { capacity: u32 },

    #[error("version record error: {0}")]
    Record(#[from] RecordError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
