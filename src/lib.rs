// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! BariumDB: a multi-tenant, versioned, read-mostly embedded key-value store
//!
//! Many independent logical databases live under a single data root. Each
//! database is a sequence of immutable RocksDB snapshots: bulk writes
//! publish a whole new version atomically, readers always see the latest
//! published version, and expired versions are reclaimed in the
//! background. Cooperating processes coordinate through a fixed-layout
//! memory-mapped record file guarded by byte-range advisory locks, so
//! several processes can read and publish against the same data root.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use bariumdb::{
//!     I64Codec, ManagerConfig, MapWriter, MultiDbManager, RocksEngine, StringCodec,
//! };
//!
//! let manager: MultiDbManager<i64, String, RocksEngine> = MultiDbManager::new(
//!     ManagerConfig::new("/var/lib/bariumdb"),
//!     Arc::new(RocksEngine),
//!     Arc::new(I64Codec),
//!     Arc::new(StringCodec),
//! )
//! .unwrap();
//!
//! let data = HashMap::from([(1i64, "a".to_string()), (2, "b".to_string())]);
//! manager.create_and_fill("users", &MapWriter::new(data)).unwrap();
//!
//! let db = manager.get_db("users").unwrap();
//! assert_eq!(db.get(&1), Some("a".to_string()));
//! ```

pub mod codec;
pub mod db;
pub mod engine;
pub mod manager;
pub mod record;

pub use codec::{Codec, CodecError, I64Codec, StringCodec};
pub use db::{
    DbConfig, MapWriter, OnceWriter, SnapshotError, SnapshotWriter, VersionedDb, WriteOutcome,
};
pub use engine::{EngineError, RocksEngine, RocksHandle, SnapshotEngine};
pub use manager::{ManagerConfig, ManagerError, MultiDbManager};
pub use record::{FixedVersionRecord, RecordError, CLEARING};
