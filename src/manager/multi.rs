// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The multi-database manager.

use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use tracing::{error, info, warn};

use crate::codec::Codec;
use crate::db::{reclaim_expired, OnceWriter, VersionedDb, WriteOutcome};
use crate::engine::SnapshotEngine;
use crate::record::FixedVersionRecord;

use super::config::ManagerConfig;
use super::error::ManagerError;

/// Reclamation window used by the disk-quota path, independent of any
/// per-database clear timeout.
const DISK_QUOTA_CLEAR_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

const BYTES_PER_GB: u64 = 1 << 30;

struct CachedDb<K, V, E: SnapshotEngine> {
    db: Arc<VersionedDb<K, V, E>>,
    last_access: Instant,
}

struct Shared<K, V, E: SnapshotEngine> {
    config: ManagerConfig,
    engine: Arc<E>,
    key_codec: Arc<dyn Codec<K>>,
    value_codec: Arc<dyn Codec<V>>,
    dbs: Mutex<LruCache<String, CachedDb<K, V, E>>>,
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    /// Sleeps up to `timeout`; returns whether the manager is stopping.
    fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if *stopped {
            return true;
        }
        self.cond.wait_for(&mut stopped, timeout);
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }
}

/// Hosts every logical database under one data root.
///
/// Databases open lazily on first reference and live in a bounded
/// least-recently-used cache; eviction and idle expiry close them. A
/// single background worker periodically retires expired snapshot
/// versions in every resident database. The worker holds only a weak
/// reference to the manager state, so it can never keep a dropped
/// manager alive.
pub struct MultiDbManager<K, V, E: SnapshotEngine> {
    shared: Arc<Shared<K, V, E>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<StopSignal>,
}

impl<K: 'static, V: 'static, E: SnapshotEngine> MultiDbManager<K, V, E> {
    /// Creates the manager, its data root, and the maintenance worker.
    pub fn new(
        config: ManagerConfig,
        engine: Arc<E>,
        key_codec: Arc<dyn Codec<K>>,
        value_codec: Arc<dyn Codec<V>>,
    ) -> Result<Self, ManagerError> {
        if !config.data_dir.exists() {
            fs::create_dir_all(&config.data_dir)?;
        }
        if !config.data_dir.is_dir() {
            return Err(ManagerError::DataDirNotDirectory {
                path: config.data_dir.clone(),
            });
        }

        let dbs = Mutex::new(LruCache::new(
            NonZeroUsize::new(config.max_open_db).unwrap_or(NonZeroUsize::MIN),
        ));
        let delay = config.clean_task_delay;
        let period = config.clean_task_period;
        let shared = Arc::new(Shared {
            config,
            engine,
            key_codec,
            value_codec,
            dbs,
        });

        let stop = Arc::new(StopSignal::default());
        let worker_stop = Arc::clone(&stop);
        let worker_shared = Arc::downgrade(&shared);
        let worker = std::thread::Builder::new()
            .name("bariumdb-maintenance".to_string())
            .spawn(move || {
                if worker_stop.wait(delay) {
                    return;
                }
                loop {
                    match worker_shared.upgrade() {
                        Some(shared) => maintenance_tick(&shared),
                        None => return,
                    }
                    if worker_stop.wait(period) {
                        return;
                    }
                }
            })
            .map_err(ManagerError::Io)?;

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            stop,
        })
    }
}

impl<K, V, E: SnapshotEngine> MultiDbManager<K, V, E> {
    /// Returns the database `name`, opening it if necessary.
    ///
    /// A blank or invalid name, or a database that fails to open,
    /// yields `None`; open failures are logged and not cached.
    pub fn get_db(&self, name: &str) -> Option<Arc<VersionedDb<K, V, E>>> {
        match self.resolve(name) {
            Ok(db) => Some(db),
            Err(ManagerError::InvalidName(_)) => None,
            Err(e) => {
                error!(db = name, error = %e, "failed to open database");
                None
            }
        }
    }

    /// Publishes a snapshot produced by `producer` into the database
    /// `name`, creating the database if needed, then enforces the disk
    /// quota across the data root.
    pub fn create_and_fill(
        &self,
        name: &str,
        producer: &dyn OnceWriter<K, V, E>,
    ) -> Result<WriteOutcome, ManagerError> {
        let db = self.resolve(name)?;
        let outcome = db.write_once(producer)?;
        self.enforce_disk_quota()?;
        Ok(outcome)
    }

    /// Reclaims expired versions across every database under the data
    /// root if total usage exceeds the configured ceiling.
    ///
    /// Version records are opened directly from disk, so databases that
    /// are not resident in the cache are reclaimable too.
    pub fn enforce_disk_quota(&self) -> Result<(), ManagerError> {
        let config = &self.shared.config;
        let ceiling = config.max_disk_usage_gb * BYTES_PER_GB;
        let total = directory_size(&config.data_dir)?;
        if total <= ceiling {
            return Ok(());
        }
        warn!(total, ceiling, "disk usage over ceiling; reclaiming expired versions");

        for entry in fs::read_dir(&config.data_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to read data root entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let record = match FixedVersionRecord::open(&path, config.db.version_capacity) {
                Ok(record) => record,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to open version record");
                    continue;
                }
            };
            match record.latest() {
                Ok(latest) => reclaim_expired(&record, &path, DISK_QUOTA_CLEAR_WINDOW, latest),
                Err(e) => error!(path = %path.display(), error = %e, "failed to read current version"),
            }
            record.close();
        }

        info!(
            usage = directory_size(&config.data_dir)?,
            "disk usage after reclamation"
        );
        Ok(())
    }

    /// Stops the maintenance worker and closes every resident database.
    /// Idempotent; also run on drop.
    pub fn close(&self) {
        self.stop.stop();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
        let mut dbs = self.shared.dbs.lock();
        while let Some((name, cached)) = dbs.pop_lru() {
            cached.db.close();
            info!(db = %name, "closed database");
        }
    }

    fn resolve(&self, name: &str) -> Result<Arc<VersionedDb<K, V, E>>, ManagerError> {
        if name.trim().is_empty() || name.contains(std::path::is_separator) {
            return Err(ManagerError::InvalidName(name.to_string()));
        }
        let shared = &self.shared;
        let mut dbs = shared.dbs.lock();
        if let Some(cached) = dbs.get_mut(name) {
            cached.last_access = Instant::now();
            return Ok(Arc::clone(&cached.db));
        }

        let db = Arc::new(VersionedDb::open(
            &shared.config.data_dir,
            name,
            shared.config.db.clone(),
            Arc::clone(&shared.engine),
            Arc::clone(&shared.key_codec),
            Arc::clone(&shared.value_codec),
        )?);
        let evicted = dbs.push(
            name.to_string(),
            CachedDb {
                db: Arc::clone(&db),
                last_access: Instant::now(),
            },
        );
        if let Some((evicted_name, cached)) = evicted {
            if evicted_name != name {
                cached.db.close();
                info!(db = %evicted_name, "closed evicted database");
            }
        }
        Ok(db)
    }
}

impl<K, V, E: SnapshotEngine> Drop for MultiDbManager<K, V, E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// One maintenance pass: evict idle databases, then retire expired
/// snapshot versions in every remaining resident. Per-database failures
/// are logged inside [`VersionedDb::clear`] and never abort the pass.
fn maintenance_tick<K, V, E: SnapshotEngine>(shared: &Shared<K, V, E>) {
    let residents: Vec<Arc<VersionedDb<K, V, E>>> = {
        let mut dbs = shared.dbs.lock();
        let idle: Vec<String> = dbs
            .iter()
            .filter(|(_, cached)| cached.last_access.elapsed() > shared.config.max_idle_time)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &idle {
            if let Some(cached) = dbs.pop(name) {
                cached.db.close();
                info!(db = %name, "closed idle database");
            }
        }
        dbs.iter().map(|(_, cached)| Arc::clone(&cached.db)).collect()
    };
    for db in residents {
        db.clear();
    }
}

/// Total size of the regular files under `path`. Entries that vanish
/// mid-walk are skipped.
fn directory_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if metadata.is_dir() {
            total += directory_size(&entry.path()).unwrap_or(0);
        } else if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{I64Codec, StringCodec};
    use crate::db::MapWriter;
    use crate::engine::RocksEngine;
    use crate::record::CLEARING;
    use std::collections::HashMap;
    use tempfile::TempDir;

    type TestManager = MultiDbManager<i64, String, RocksEngine>;

    fn create_test_manager(config: ManagerConfig) -> TestManager {
        MultiDbManager::new(
            config,
            Arc::new(RocksEngine),
            Arc::new(I64Codec),
            Arc::new(StringCodec),
        )
        .unwrap()
    }

    fn quiet_config(dir: &TempDir) -> ManagerConfig {
        // Maintenance far in the future so tests control when it runs.
        ManagerConfig::new(dir.path())
            .with_clean_task_schedule(Duration::from_secs(3600), Duration::from_secs(3600))
    }

    fn map_producer(pairs: &[(i64, &str)]) -> MapWriter<i64, String> {
        MapWriter::new(
            pairs
                .iter()
                .map(|(k, v)| (*k, v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn age_record(db_path: &Path, version: i32, hours: i64) {
        let record = FixedVersionRecord::open(db_path, 64).unwrap();
        let stamp = record.record_value(version).unwrap();
        let aged = crate::db::unix_millis() - hours * 60 * 60 * 1000;
        assert!(record
            .compare_and_set_record_value(version, stamp, aged)
            .unwrap());
        record.close();
    }

    #[test]
    fn test_blank_or_invalid_name_yields_none() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir));
        assert!(manager.get_db("").is_none());
        assert!(manager.get_db("   ").is_none());
        assert!(manager.get_db("a/b").is_none());
    }

    #[test]
    fn test_create_and_fill_then_read() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir));

        let outcome = manager
            .create_and_fill("db1", &map_producer(&[(1, "a"), (2, "b")]))
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Installed(1));

        let db = manager.get_db("db1").unwrap();
        assert_eq!(db.version(), 1);
        assert_eq!(db.get(&1), Some("a".to_string()));
        assert_eq!(db.get(&2), Some("b".to_string()));
        assert_eq!(db.get(&3), None);
    }

    #[test]
    fn test_create_and_fill_rejects_invalid_name() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir));
        let result = manager.create_and_fill("", &map_producer(&[(1, "a")]));
        assert!(matches!(result, Err(ManagerError::InvalidName(_))));
    }

    #[test]
    fn test_get_db_shares_cached_instance() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir));

        let a = manager.get_db("db1").unwrap();
        let b = manager.get_db("db1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_database_cache_is_bounded() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir).with_max_open_db(2));

        manager.get_db("db1").unwrap();
        manager.get_db("db2").unwrap();
        manager.get_db("db3").unwrap();
        assert_eq!(manager.shared.dbs.lock().len(), 2);
    }

    #[test]
    fn test_disk_quota_reclaims_expired_versions() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir).with_max_disk_usage_gb(0));

        let db = manager.get_db("db1").unwrap();
        db.write_once(&map_producer(&[(1, "a")])).unwrap();
        db.get(&1); // stamp version 1
        db.write_once(&map_producer(&[(1, "x")])).unwrap();

        age_record(&dir.path().join("db1"), 1, 25);
        manager.enforce_disk_quota().unwrap();

        assert!(!dir.path().join("db1").join("1").exists());
        assert!(dir.path().join("db1").join("2").is_dir());
        assert_eq!(db.get(&1), Some("x".to_string()));
    }

    #[test]
    fn test_disk_quota_under_ceiling_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir).with_max_disk_usage_gb(10));

        let db = manager.get_db("db1").unwrap();
        db.write_once(&map_producer(&[(1, "a")])).unwrap();
        db.write_once(&map_producer(&[(1, "x")])).unwrap();

        age_record(&dir.path().join("db1"), 1, 25);
        manager.enforce_disk_quota().unwrap();

        assert!(dir.path().join("db1").join("1").is_dir());
    }

    #[test]
    fn test_disk_quota_spares_recently_opened_versions() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir).with_max_disk_usage_gb(0));

        let db = manager.get_db("db1").unwrap();
        db.write_once(&map_producer(&[(1, "a")])).unwrap();
        db.get(&1); // fresh stamp on version 1
        db.write_once(&map_producer(&[(1, "x")])).unwrap();

        manager.enforce_disk_quota().unwrap();
        assert!(dir.path().join("db1").join("1").is_dir());
    }

    #[test]
    fn test_maintenance_tick_clears_expired_versions() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir));

        let db = manager.get_db("db1").unwrap();
        db.write_once(&map_producer(&[(1, "a")])).unwrap();
        db.get(&1);
        db.write_once(&map_producer(&[(1, "x")])).unwrap();
        age_record(&dir.path().join("db1"), 1, 25);

        maintenance_tick(&manager.shared);

        assert!(!dir.path().join("db1").join("1").exists());
        let record = FixedVersionRecord::open(dir.path().join("db1"), 64).unwrap();
        assert_eq!(record.record_value(1).unwrap(), CLEARING);
    }

    #[test]
    fn test_maintenance_tick_evicts_idle_databases() {
        let dir = TempDir::new().unwrap();
        let manager =
            create_test_manager(quiet_config(&dir).with_max_idle_time(Duration::ZERO));

        manager.get_db("db1").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        maintenance_tick(&manager.shared);
        assert_eq!(manager.shared.dbs.lock().len(), 0);
    }

    #[test]
    fn test_background_worker_runs_maintenance() {
        let dir = TempDir::new().unwrap();
        let config = ManagerConfig::new(dir.path())
            .with_clean_task_schedule(Duration::from_millis(10), Duration::from_millis(10));
        let manager = create_test_manager(config);

        let db = manager.get_db("db1").unwrap();
        db.write_once(&map_producer(&[(1, "a")])).unwrap();
        db.get(&1);
        db.write_once(&map_producer(&[(1, "x")])).unwrap();
        age_record(&dir.path().join("db1"), 1, 25);

        let deadline = Instant::now() + Duration::from_secs(5);
        while dir.path().join("db1").join("1").exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!dir.path().join("db1").join("1").exists());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let manager = create_test_manager(quiet_config(&dir));
        manager.get_db("db1").unwrap();
        manager.close();
        manager.close();
        assert_eq!(manager.shared.dbs.lock().len(), 0);
    }

    #[test]
    fn test_orphan_scratch_swept_when_database_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let manager = create_test_manager(quiet_config(&dir));
            manager
                .create_and_fill("db1", &map_producer(&[(1, "a")]))
                .unwrap();
        }
        let orphan = dir.path().join("db1").join("_temp_v2_999");
        fs::create_dir_all(&orphan).unwrap();

        let manager = create_test_manager(quiet_config(&dir));
        let db = manager.get_db("db1").unwrap();
        assert!(!orphan.exists());
        assert_eq!(db.get(&1), Some("a".to_string()));
    }
}
