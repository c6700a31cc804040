// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Engine error types.

/// Errors surfaced by the embedded key-value engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
