// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Snapshot engine abstraction.
//!
//! The store does not implement its own key-value engine; it drives an
//! embedded engine through the narrow [`SnapshotEngine`] contract. The
//! only implementation shipped here is [`RocksEngine`], backed by RocksDB.

mod error;
mod rocks;
mod traits;

pub use error::EngineError;
pub use rocks::{RocksEngine, RocksHandle};
pub use traits::SnapshotEngine;
