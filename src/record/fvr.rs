// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Memory-mapped fixed version record file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use tracing::warn;

use super::error::RecordError;
use super::range_lock::RangeLockGuard;

/// File name of the version record inside a database directory.
const VERSION_FILE_NAME: &str = "_VERSION";

/// Size of the current-version field at the head of the file.
const META_SIZE: usize = 4;

/// Size of one per-version record: i32 tag + i64 value.
const RECORD_SIZE: usize = 12;

/// Record capacity used when the requested capacity is out of range.
pub const DEFAULT_RECORDS: u32 = 64;

/// Hard upper bound on the record capacity.
pub const MAX_RECORDS: u32 = 1024;

/// Record value marking a version whose directory is being reclaimed.
///
/// Readers must refuse to open a version whose record value is at or
/// below this sentinel.
pub const CLEARING: i64 = -1;

struct Mapped {
    file: Arc<File>,
    map: MmapMut,
}

/// Cross-process-safe record of a database's published version and
/// per-version last-access timestamps.
///
/// The backing file is mapped read-write and shared with every other
/// process holding the database open. The current-version field and each
/// per-version record are guarded by disjoint byte-range advisory locks;
/// plain reads go straight to the mapped pages without locking. The
/// on-disk integers are little-endian.
///
/// One instance serializes its own threads through an internal mutex;
/// mutual exclusion against other instances (same process or not) comes
/// from the open-file-description locks.
pub struct FixedVersionRecord {
    capacity: u32,
    path: PathBuf,
    inner: Mutex<Option<Mapped>>,
}

impl FixedVersionRecord {
    /// Opens (creating and zero-filling if needed) the record file for a
    /// database directory, with the default record capacity.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        Self::open(path, DEFAULT_RECORDS)
    }

    /// Opens the record file at `path` with room for `records` versions.
    ///
    /// `path` may name the database directory or the `_VERSION` file
    /// itself. A capacity of zero or above [`MAX_RECORDS`] falls back to
    /// [`DEFAULT_RECORDS`]. If the file is shorter than the configured
    /// layout it is extended with zero bytes and flushed before mapping.
    pub fn open(path: impl AsRef<Path>, records: u32) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let path = if path.file_name().is_some_and(|n| n == VERSION_FILE_NAME) {
            path.to_path_buf()
        } else {
            path.join(VERSION_FILE_NAME)
        };
        let capacity = if records == 0 || records > MAX_RECORDS {
            DEFAULT_RECORDS
        } else {
            records
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let expected = (META_SIZE + capacity as usize * RECORD_SIZE) as u64;
        let current = file.metadata()?.len();
        if current < expected {
            let mut f = &file;
            f.seek(SeekFrom::Start(current))?;
            f.write_all(&vec![0u8; (expected - current) as usize])?;
            file.sync_all()?;
        }
        let map_len = expected.max(current) as usize;
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(&file)? };

        Ok(Self {
            capacity,
            path,
            inner: Mutex::new(Some(Mapped {
                file: Arc::new(file),
                map,
            })),
        })
    }

    /// Number of version records the file can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Path of the backing `_VERSION` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the published current version. `0` means no version has been
    /// published yet.
    ///
    /// Reads without taking any lock; under a racing writer the value may
    /// be momentarily stale, which callers re-validate on their next
    /// compare-and-set or record read.
    pub fn latest(&self) -> Result<i32, RecordError> {
        let guard = self.inner.lock();
        let mapped = guard.as_ref().ok_or(RecordError::Closed)?;
        Ok(read_i32(&mapped.map, 0))
    }

    /// Atomically publishes `new` as the current version if the stored
    /// value still equals `expected`.
    ///
    /// `new` must lie in `[1, capacity]` and strictly exceed `expected`;
    /// violating either is a caller bug and reported as an error, not a
    /// miss. Returns `false` when the meta range is locked elsewhere or
    /// the stored value no longer matches.
    pub fn compare_and_set_meta(&self, expected: i32, new: i32) -> Result<bool, RecordError> {
        self.check_version(new)?;
        if new <= expected {
            return Err(RecordError::VersionNotAdvancing { expected, new });
        }

        let mut guard = self.inner.lock();
        let mapped = guard.as_mut().ok_or(RecordError::Closed)?;
        let _lock = match RangeLockGuard::try_exclusive(&mapped.file, 0, META_SIZE as i64)
            .map_err(RecordError::Lock)?
        {
            Some(lock) => lock,
            None => return Ok(false),
        };

        if read_i32(&mapped.map, 0) != expected {
            return Ok(false);
        }
        write_i32(&mut mapped.map, 0, new);
        mapped.map.flush_range(0, META_SIZE)?;
        Ok(true)
    }

    /// Reads the record value for `version` without locking.
    pub fn record_value(&self, version: i32) -> Result<i64, RecordError> {
        self.check_version(version)?;
        let guard = self.inner.lock();
        let mapped = guard.as_ref().ok_or(RecordError::Closed)?;
        Ok(read_i64(&mapped.map, record_offset(version) + META_SIZE))
    }

    /// Atomically replaces the record value for `version` if it still
    /// equals `expected`.
    ///
    /// Initializes the record's version tag on first use. Returns `false`
    /// when the record range is locked elsewhere, the stored value no
    /// longer matches, or the flush fails recoverably.
    pub fn compare_and_set_record_value(
        &self,
        version: i32,
        expected: i64,
        new: i64,
    ) -> Result<bool, RecordError> {
        self.check_version(version)?;
        let offset = record_offset(version);

        let mut guard = self.inner.lock();
        let mapped = guard.as_mut().ok_or(RecordError::Closed)?;
        let _lock = match RangeLockGuard::try_exclusive(
            &mapped.file,
            offset as i64,
            RECORD_SIZE as i64,
        )
        .map_err(RecordError::Lock)?
        {
            Some(lock) => lock,
            None => return Ok(false),
        };

        if read_i32(&mapped.map, offset) != version {
            write_i32(&mut mapped.map, offset, version);
        }
        if read_i64(&mapped.map, offset + META_SIZE) != expected {
            return Ok(false);
        }
        write_i64(&mut mapped.map, offset + META_SIZE, new);
        if let Err(e) = mapped.map.flush_range(offset, RECORD_SIZE) {
            warn!(version, error = %e, "failed to flush record value");
            return Ok(false);
        }
        Ok(true)
    }

    /// Attempts to lock the current-version field for an external
    /// multi-step critical section.
    pub fn try_lock_meta(&self) -> Result<Option<RangeLockGuard>, RecordError> {
        let guard = self.inner.lock();
        let mapped = guard.as_ref().ok_or(RecordError::Closed)?;
        RangeLockGuard::try_exclusive(&mapped.file, 0, META_SIZE as i64).map_err(RecordError::Lock)
    }

    /// Attempts to lock the record range for `version`.
    pub fn try_lock_record(&self, version: i32) -> Result<Option<RangeLockGuard>, RecordError> {
        self.check_version(version)?;
        let guard = self.inner.lock();
        let mapped = guard.as_ref().ok_or(RecordError::Closed)?;
        RangeLockGuard::try_exclusive(
            &mapped.file,
            record_offset(version) as i64,
            RECORD_SIZE as i64,
        )
        .map_err(RecordError::Lock)
    }

    /// Unmaps and closes the backing file. Idempotent.
    pub fn close(&self) {
        self.inner.lock().take();
    }

    fn check_version(&self, version: i32) -> Result<(), RecordError> {
        if version < 1 || version as u32 > self.capacity {
            return Err(RecordError::VersionOutOfRange {
                version,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

/// Byte offset of the record for `version` (tag included).
fn record_offset(version: i32) -> usize {
    META_SIZE + (version as usize - 1) * RECORD_SIZE
}

fn read_i32(map: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&map[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

fn write_i32(map: &mut [u8], offset: usize, value: i32) {
    map[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_i64(map: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&map[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}

fn write_i64(map: &mut [u8], offset: usize, value: i64) {
    map[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
