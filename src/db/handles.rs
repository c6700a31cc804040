// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Bounded cache of open snapshot handles.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

struct CachedHandle<H> {
    handle: Arc<H>,
    last_access: Instant,
}

/// `version -> open handle` cache with LRU capacity and access-time
/// expiry.
///
/// Eviction drops the cached reference; the underlying engine instance
/// closes when the last outstanding reference (a reader mid-call may
/// hold one) goes away. Idle entries are dropped on access and by
/// [`sweep_idle`](HandleCache::sweep_idle), which the maintenance path
/// calls periodically.
pub(crate) struct HandleCache<H> {
    entries: LruCache<i32, CachedHandle<H>>,
    idle_timeout: Duration,
}

impl<H> HandleCache<H> {
    pub(crate) fn new(capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            entries: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            ),
            idle_timeout,
        }
    }

    /// Returns the cached handle for `version`, refreshing its access
    /// time, or `None` if absent or expired.
    pub(crate) fn get(&mut self, version: i32) -> Option<Arc<H>> {
        let expired = self
            .entries
            .peek(&version)
            .map(|entry| entry.last_access.elapsed() > self.idle_timeout)?;
        if expired {
            self.entries.pop(&version);
            debug!(version, "closed idle snapshot handle");
            return None;
        }
        let entry = self.entries.get_mut(&version)?;
        entry.last_access = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    /// Caches a freshly opened handle, evicting the least recently used
    /// entry at capacity.
    pub(crate) fn insert(&mut self, version: i32, handle: Arc<H>) {
        let evicted = self.entries.push(
            version,
            CachedHandle {
                handle,
                last_access: Instant::now(),
            },
        );
        if let Some((evicted_version, _)) = evicted {
            if evicted_version != version {
                debug!(version = evicted_version, "evicted snapshot handle");
            }
        }
    }

    /// Drops every entry idle for longer than the timeout. Returns how
    /// many were closed.
    pub(crate) fn sweep_idle(&mut self) -> usize {
        let expired: Vec<i32> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_access.elapsed() > self.idle_timeout)
            .map(|(version, _)| *version)
            .collect();
        for version in &expired {
            self.entries.pop(version);
        }
        expired.len()
    }

    /// Drops every cached handle.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_refreshes_and_returns_same_handle() {
        let mut cache: HandleCache<u32> = HandleCache::new(4, Duration::from_secs(60));
        cache.insert(1, Arc::new(11));

        let a = cache.get(1).unwrap();
        let b = cache.get(1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.get(2), None);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let mut cache: HandleCache<u32> = HandleCache::new(2, Duration::from_secs(60));
        cache.insert(1, Arc::new(11));
        cache.insert(2, Arc::new(22));

        // Touch 1 so 2 becomes the eviction candidate.
        cache.get(1);
        cache.insert(3, Arc::new(33));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn test_idle_entry_dropped_on_access() {
        let mut cache: HandleCache<u32> = HandleCache::new(4, Duration::from_millis(10));
        cache.insert(1, Arc::new(11));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(1).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_sweep_idle() {
        let mut cache: HandleCache<u32> = HandleCache::new(4, Duration::from_millis(10));
        cache.insert(1, Arc::new(11));
        cache.insert(2, Arc::new(22));
        std::thread::sleep(Duration::from_millis(30));
        cache.insert(3, Arc::new(33));

        assert_eq!(cache.sweep_idle(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(3).is_some());
    }
}
