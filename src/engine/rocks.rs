// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB-backed snapshot engine.

use std::path::Path;

use rocksdb::{BlockBasedOptions, DBWithThreadMode, MultiThreaded, Options};

use super::error::EngineError;
use super::traits::SnapshotEngine;

type Db = DBWithThreadMode<MultiThreaded>;

/// An open RocksDB instance bound to one snapshot directory.
pub struct RocksHandle {
    db: Db,
    writable: bool,
}

/// Snapshot engine backed by RocksDB.
///
/// Snapshots are bulk-loaded once and then served read-only, so the
/// writable options favor large memtables and point-lookup-friendly
/// tables over write-path concurrency.
#[derive(Debug, Clone, Copy, Default)]
pub struct RocksEngine;

impl RocksEngine {
    fn writable_options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);

        // Bloom filters for the point lookups the read path issues.
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        opts
    }
}

impl SnapshotEngine for RocksEngine {
    type Handle = RocksHandle;

    fn open_writable(&self, dir: &Path) -> Result<RocksHandle, EngineError> {
        let db = Db::open(&Self::writable_options(), dir)?;
        Ok(RocksHandle { db, writable: true })
    }

    fn open_readonly(&self, dir: &Path) -> Result<RocksHandle, EngineError> {
        let db = Db::open_for_read_only(&Options::default(), dir, false)?;
        Ok(RocksHandle {
            db,
            writable: false,
        })
    }

    fn put(&self, handle: &RocksHandle, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        handle.db.put(key, value)?;
        Ok(())
    }

    fn get(&self, handle: &RocksHandle, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(handle.db.get(key)?)
    }

    fn multi_get(
        &self,
        handle: &RocksHandle,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Option<Vec<u8>>>, EngineError> {
        let mut values = Vec::with_capacity(keys.len());
        for result in handle.db.multi_get(keys) {
            values.push(result?);
        }
        Ok(values)
    }

    fn close(&self, handle: RocksHandle) -> Result<(), EngineError> {
        if handle.writable {
            handle.db.flush()?;
        }
        drop(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_only() {
        let dir = TempDir::new().unwrap();
        let engine = RocksEngine;

        let writable = engine.open_writable(dir.path()).unwrap();
        engine.put(&writable, b"k1", b"v1").unwrap();
        engine.put(&writable, b"k2", b"v2").unwrap();
        engine.close(writable).unwrap();

        let readonly = engine.open_readonly(dir.path()).unwrap();
        assert_eq!(engine.get(&readonly, b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(engine.get(&readonly, b"k2").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(engine.get(&readonly, b"k3").unwrap(), None);
    }

    #[test]
    fn test_multi_get_positionally_aligned() {
        let dir = TempDir::new().unwrap();
        let engine = RocksEngine;

        let writable = engine.open_writable(dir.path()).unwrap();
        engine.put(&writable, b"a", b"1").unwrap();
        engine.put(&writable, b"c", b"3").unwrap();
        engine.close(writable).unwrap();

        let readonly = engine.open_readonly(dir.path()).unwrap();
        let keys = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let values = engine.multi_get(&readonly, &keys).unwrap();
        assert_eq!(
            values,
            vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]
        );
    }

    #[test]
    fn test_readonly_open_of_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let engine = RocksEngine;
        assert!(engine.open_readonly(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_multiple_readonly_handles() {
        let dir = TempDir::new().unwrap();
        let engine = RocksEngine;

        let writable = engine.open_writable(dir.path()).unwrap();
        engine.put(&writable, b"k", b"v").unwrap();
        engine.close(writable).unwrap();

        let a = engine.open_readonly(dir.path()).unwrap();
        let b = engine.open_readonly(dir.path()).unwrap();
        assert_eq!(engine.get(&a, b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(engine.get(&b, b"k").unwrap(), Some(b"v".to_vec()));
    }
}
