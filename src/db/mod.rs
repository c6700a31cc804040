// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! One logical database: write-once snapshot publication, reads against
//! the latest published version, and reclamation of expired versions.
//!
//! A [`VersionedDb`] owns a directory containing numbered snapshot
//! directories plus the `_VERSION` record file. Writers publish whole
//! snapshots through [`VersionedDb::write_once`]; readers always see the
//! version that was current when their call started. Old versions stay
//! on disk until [`VersionedDb::clear`] retires the ones that have not
//! been opened within the configured window.

mod config;
mod error;
mod handles;
mod versioned;
mod writer;

pub use config::DbConfig;
pub use error::SnapshotError;
pub use versioned::{VersionedDb, WriteOutcome};
pub use writer::{MapWriter, OnceWriter, SnapshotWriter};

pub(crate) use versioned::reclaim_expired;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
