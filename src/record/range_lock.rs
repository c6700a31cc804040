// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Non-blocking byte-range advisory locks.
//!
//! Open-file-description locks (`F_OFD_SETLK`) are scoped to the open file
//! description rather than the process, so two handles on the same file
//! conflict with each other even inside one process, and a lock survives
//! unrelated file descriptors being closed.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use nix::libc;
use tracing::debug;

/// Exclusive byte-range lock, released on drop.
pub struct RangeLockGuard {
    file: Arc<File>,
    start: i64,
    len: i64,
}

impl RangeLockGuard {
    /// Attempts to take an exclusive lock on `[start, start + len)`.
    ///
    /// Returns `None` when the range is held by another open file
    /// description; errors only on unexpected `fcntl` failures.
    pub(crate) fn try_exclusive(
        file: &Arc<File>,
        start: i64,
        len: i64,
    ) -> io::Result<Option<Self>> {
        if fcntl_range(file, libc::F_WRLCK, start, len)? {
            Ok(Some(Self {
                file: Arc::clone(file),
                start,
                len,
            }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for RangeLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fcntl_range(&self.file, libc::F_UNLCK, self.start, self.len) {
            debug!(start = self.start, len = self.len, error = %e, "failed to release range lock");
        }
    }
}

/// Issues a non-blocking `F_OFD_SETLK` for the given range and lock type.
///
/// Returns `false` when the range is contended, `true` on success.
fn fcntl_range(file: &File, lock_type: i32, start: i64, len: i64) -> io::Result<bool> {
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = lock_type as libc::c_short;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = start as libc::off_t;
    fl.l_len = len as libc::off_t;
    // F_OFD_SETLK requires l_pid == 0 (already zeroed).

    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_OFD_SETLK, &fl) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EAGAIN) | Some(libc::EACCES) => Ok(false),
        _ => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn open_shared(dir: &TempDir) -> Arc<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(dir.path().join("lockfile"))
            .unwrap();
        file.set_len(64).unwrap();
        Arc::new(file)
    }

    #[test]
    fn test_lock_and_release() {
        let dir = TempDir::new().unwrap();
        let file = open_shared(&dir);

        let guard = RangeLockGuard::try_exclusive(&file, 0, 4).unwrap();
        assert!(guard.is_some());
        drop(guard);

        // Released on drop, so the range can be taken again.
        assert!(RangeLockGuard::try_exclusive(&file, 0, 4)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_conflict_across_descriptions() {
        let dir = TempDir::new().unwrap();
        let a = open_shared(&dir);
        let b = Arc::new(File::options()
            .read(true)
            .write(true)
            .open(dir.path().join("lockfile"))
            .unwrap());

        let _held = RangeLockGuard::try_exclusive(&a, 0, 4).unwrap().unwrap();
        assert!(RangeLockGuard::try_exclusive(&b, 0, 4).unwrap().is_none());
    }

    #[test]
    fn test_disjoint_ranges_do_not_conflict() {
        let dir = TempDir::new().unwrap();
        let a = open_shared(&dir);
        let b = Arc::new(File::options()
            .read(true)
            .write(true)
            .open(dir.path().join("lockfile"))
            .unwrap());

        let _meta = RangeLockGuard::try_exclusive(&a, 0, 4).unwrap().unwrap();
        assert!(RangeLockGuard::try_exclusive(&b, 4, 12).unwrap().is_some());
    }
}
