// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Versioned database over immutable snapshots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{Codec, CodecError};
use crate::engine::SnapshotEngine;
use crate::record::{FixedVersionRecord, CLEARING};

use super::config::DbConfig;
use super::error::SnapshotError;
use super::handles::HandleCache;
use super::unix_millis;
use super::writer::{OnceWriter, SnapshotWriter};

/// Prefix of the scratch directory a writer populates before publishing.
const SCRATCH_PREFIX: &str = "_temp_v";

/// Result of a publication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The snapshot was published as this version.
    Installed(i32),
    /// The producer reported failure; the scratch snapshot was discarded.
    ProducerAborted,
    /// Another writer published first; the scratch snapshot was
    /// discarded. Retrying will target the next free version.
    Lost,
}

/// One logical database: a directory of numbered immutable snapshots,
/// a version record file, and a bounded cache of open handles.
///
/// Reads never fail: any error on the read path is logged and reported
/// as absence. Writes publish a whole snapshot at once; the previous
/// version stays readable throughout and afterwards, until reclaimed.
pub struct VersionedDb<K, V, E: SnapshotEngine> {
    name: String,
    path: PathBuf,
    record: FixedVersionRecord,
    engine: Arc<E>,
    key_codec: Arc<dyn Codec<K>>,
    value_codec: Arc<dyn Codec<V>>,
    handles: Mutex<HandleCache<E::Handle>>,
    config: DbConfig,
}

impl<K, V, E: SnapshotEngine> VersionedDb<K, V, E> {
    /// Opens (creating if absent) the database `name` under `data_dir`.
    ///
    /// Orphaned scratch directories left behind by crashed writers are
    /// deleted before the database is handed out.
    pub fn open(
        data_dir: &Path,
        name: &str,
        config: DbConfig,
        engine: Arc<E>,
        key_codec: Arc<dyn Codec<K>>,
        value_codec: Arc<dyn Codec<V>>,
    ) -> Result<Self, SnapshotError> {
        if name.trim().is_empty() || name.contains(std::path::is_separator) {
            return Err(SnapshotError::InvalidName(name.to_string()));
        }
        let path = data_dir.join(name);
        fs::create_dir_all(&path)?;
        let record = FixedVersionRecord::open(&path, config.version_capacity)?;
        sweep_orphan_scratch(name, &path);

        Ok(Self {
            name: name.to_string(),
            handles: Mutex::new(HandleCache::new(
                config.max_open_handles,
                config.handle_idle_timeout,
            )),
            path,
            record,
            engine,
            key_codec,
            value_codec,
            config,
        })
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the snapshots and the version record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The currently published version; `0` while the database is empty.
    pub fn version(&self) -> i32 {
        match self.record.latest() {
            Ok(version) => version,
            Err(e) => {
                error!(db = %self.name, error = %e, "failed to read current version");
                0
            }
        }
    }

    /// Publishes a new snapshot produced by `producer`.
    ///
    /// The snapshot is built in a scratch directory, flushed durably,
    /// and only then made current: first the version record is advanced
    /// by compare-and-set, then the scratch directory is renamed to its
    /// version number. A reader that sees the directory has therefore
    /// already seen the version advance. Losing the compare-and-set to a
    /// concurrent writer is not an error; the caller decides whether to
    /// retry against the newer version.
    pub fn write_once(
        &self,
        producer: &dyn OnceWriter<K, V, E>,
    ) -> Result<WriteOutcome, SnapshotError> {
        let expected = self.record.latest()?;
        let next = expected + 1;
        if next as u32 > self.record.capacity() {
            return Err(SnapshotError::CapacityExhausted {
                capacity: self.record.capacity(),
            });
        }

        // Writers landing on the same millisecond bump the suffix until
        // the scratch name is free, keeping their scratch spaces disjoint.
        let mut stamp = unix_millis();
        let scratch = loop {
            let candidate = self.path.join(format!("{SCRATCH_PREFIX}{next}_{stamp}"));
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        };

        let handle = match self.engine.open_writable(&scratch) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = fs::remove_dir_all(&scratch);
                return Err(e.into());
            }
        };
        let produced = {
            let mut snapshot = SnapshotWriter::new(
                &*self.engine,
                &handle,
                &*self.key_codec,
                &*self.value_codec,
            );
            producer.write(&mut snapshot)
        };
        if let Err(e) = self.engine.close(handle) {
            let _ = fs::remove_dir_all(&scratch);
            return Err(e.into());
        }

        if !produced {
            warn!(db = %self.name, version = next, "producer aborted; discarding scratch snapshot");
            fs::remove_dir_all(&scratch)?;
            return Ok(WriteOutcome::ProducerAborted);
        }

        if self.record.compare_and_set_meta(expected, next)? {
            fs::rename(&scratch, self.path.join(next.to_string()))?;
            info!(db = %self.name, version = next, "published snapshot");
            Ok(WriteOutcome::Installed(next))
        } else {
            warn!(db = %self.name, version = next, "lost publication race; discarding scratch snapshot");
            fs::remove_dir_all(&scratch)?;
            Ok(WriteOutcome::Lost)
        }
    }

    /// Point lookup against the latest published version.
    pub fn get(&self, key: &K) -> Option<V> {
        let version = self.version();
        if version <= 0 {
            return None;
        }
        let handle = self.handle_for(version)?;
        let key_bytes = self.key_codec.encode(key);
        match self.engine.get(&handle, &key_bytes) {
            Ok(Some(bytes)) => match self.decode_stored(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    error!(db = %self.name, version, error = %e, "failed to decode value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!(db = %self.name, version, error = %e, "point read failed");
                None
            }
        }
    }

    /// Batch lookup against the latest published version.
    ///
    /// The result is positionally aligned with `keys`, with `None` at
    /// absent keys. Any engine or decode failure yields an empty vec.
    pub fn multi_get(&self, keys: &[K]) -> Vec<Option<V>> {
        let version = self.version();
        if version <= 0 {
            return Vec::new();
        }
        let handle = match self.handle_for(version) {
            Some(handle) => handle,
            None => return Vec::new(),
        };
        let key_bytes: Vec<Vec<u8>> = keys.iter().map(|k| self.key_codec.encode(k)).collect();
        let values = match self.engine.multi_get(&handle, &key_bytes) {
            Ok(values) => values,
            Err(e) => {
                error!(db = %self.name, version, error = %e, "batch read failed");
                return Vec::new();
            }
        };
        let mut result = Vec::with_capacity(values.len());
        for bytes in values {
            match bytes {
                Some(bytes) => match self.decode_stored(&bytes) {
                    Ok(value) => result.push(value),
                    Err(e) => {
                        error!(db = %self.name, version, error = %e, "failed to decode value");
                        return Vec::new();
                    }
                },
                None => result.push(None),
            }
        }
        result
    }

    /// Decodes a stored payload; an empty payload reads as absent.
    fn decode_stored(&self, bytes: &[u8]) -> Result<Option<V>, CodecError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        self.value_codec.decode(bytes).map(Some)
    }

    /// Reclaims every non-current version that has not been opened
    /// within the configured window, and closes idle snapshot handles.
    pub fn clear(&self) {
        let latest = self.version();
        reclaim_expired(&self.record, &self.path, self.config.clear_window(), latest);
        let swept = self.handles.lock().sweep_idle();
        if swept > 0 {
            debug!(db = %self.name, swept, "closed idle snapshot handles");
        }
    }

    /// Closes every cached handle and the version record file.
    /// Idempotent; also run on drop.
    pub fn close(&self) {
        self.handles.lock().clear();
        self.record.close();
    }

    /// Cached-or-opened handle for `version`.
    fn handle_for(&self, version: i32) -> Option<Arc<E::Handle>> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(version) {
            return Some(handle);
        }
        let handle = Arc::new(self.open_version(version)?);
        handles.insert(version, Arc::clone(&handle));
        Some(handle)
    }

    /// Opens `version` read-only and stamps its access record.
    fn open_version(&self, version: i32) -> Option<E::Handle> {
        if version <= 0 {
            return None;
        }
        let dir = self.path.join(version.to_string());
        if !dir.exists() {
            warn!(db = %self.name, version, path = %dir.display(), "snapshot directory missing");
            return None;
        }
        let stamp = match self.record.record_value(version) {
            Ok(stamp) => stamp,
            Err(e) => {
                error!(db = %self.name, version, error = %e, "failed to read access record");
                return None;
            }
        };
        if stamp <= CLEARING {
            warn!(db = %self.name, version, "snapshot is being reclaimed; refusing to open");
            return None;
        }
        let handle = match self.engine.open_readonly(&dir) {
            Ok(handle) => handle,
            Err(e) => {
                error!(db = %self.name, version, error = %e, "failed to open snapshot read-only");
                return None;
            }
        };
        // Best effort: a concurrent reader losing this race has stamped
        // an equally fresh time.
        let now = unix_millis();
        match self.record.compare_and_set_record_value(version, stamp, now) {
            Ok(updated) => {
                trace!(db = %self.name, version, stamp, now, updated, "stamped snapshot access time")
            }
            Err(e) => {
                warn!(db = %self.name, version, error = %e, "failed to stamp snapshot access time")
            }
        }
        Some(handle)
    }
}

impl<K, V, E: SnapshotEngine> Drop for VersionedDb<K, V, E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Deletes expired non-current versions recorded in `record`.
///
/// A version is expired when its access record is non-negative and
/// older than `window`. The deletion is gated by installing the
/// clearing sentinel via compare-and-set, so concurrent reclaimers
/// race safely: the winner deletes, the loser skips. The current
/// version (`latest`) is never a candidate.
pub(crate) fn reclaim_expired(
    record: &FixedVersionRecord,
    db_path: &Path,
    window: Duration,
    latest: i32,
) {
    let window_ms = window.as_millis() as i64;
    let now = unix_millis();
    for version in 1..latest {
        let stamp = match record.record_value(version) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!(version, error = %e, "failed to read access record");
                continue;
            }
        };
        if stamp < 0 || now.saturating_sub(stamp) <= window_ms {
            continue;
        }
        match record.compare_and_set_record_value(version, stamp, CLEARING) {
            Ok(true) => {}
            // Lost to another reclaimer or a reader that just stamped it.
            Ok(false) => continue,
            Err(e) => {
                warn!(version, error = %e, "reclamation compare-and-set failed");
                continue;
            }
        }
        let dir = db_path.join(version.to_string());
        match fs::remove_dir_all(&dir) {
            Ok(()) => info!(version, path = %dir.display(), "reclaimed expired snapshot"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(version, "snapshot directory already gone");
            }
            Err(e) => {
                error!(version, path = %dir.display(), error = %e, "failed to delete snapshot; restoring access record");
                if let Err(e) = record.compare_and_set_record_value(version, CLEARING, stamp) {
                    error!(version, error = %e, "failed to restore access record");
                }
            }
        }
    }
}

/// Deletes `_temp_v*` scratch directories left by crashed writers. They
/// were never published: the record advance and rename did not run.
fn sweep_orphan_scratch(name: &str, path: &Path) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(db = %name, error = %e, "failed to scan for orphaned scratch directories");
            return;
        }
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().starts_with(SCRATCH_PREFIX) {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => info!(db = %name, path = %entry.path().display(), "swept orphaned scratch directory"),
            Err(e) => warn!(db = %name, path = %entry.path().display(), error = %e, "failed to sweep scratch directory"),
        }
    }
}
