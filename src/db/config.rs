// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-database configuration.

use std::time::Duration;

/// Configuration for one logical database.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Number of version slots in the record file (and therefore the
    /// maximum number of snapshots the database can ever publish).
    pub version_capacity: u32,
    /// Bound on concurrently open snapshot handles.
    pub max_open_handles: usize,
    /// A cached snapshot handle unused for this long is closed.
    pub handle_idle_timeout: Duration,
    /// A non-current version unopened for this long is reclaimed.
    pub version_clear_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            version_capacity: 64,
            max_open_handles: 10,
            handle_idle_timeout: Duration::from_secs(30 * 60),
            version_clear_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl DbConfig {
    /// Sets the number of version slots.
    pub fn with_version_capacity(mut self, capacity: u32) -> Self {
        self.version_capacity = capacity;
        self
    }

    /// Sets the open-handle bound.
    pub fn with_max_open_handles(mut self, max: usize) -> Self {
        self.max_open_handles = max;
        self
    }

    /// Sets the idle timeout for cached snapshot handles.
    pub fn with_handle_idle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_idle_timeout = timeout;
        self
    }

    /// Sets how long an unopened version survives before reclamation.
    pub fn with_version_clear_timeout(mut self, timeout: Duration) -> Self {
        self.version_clear_timeout = timeout;
        self
    }

    /// The effective reclamation window.
    ///
    /// Clearing versions faster than idle handles close would delete
    /// directories that readers may still hold open, so a clear timeout
    /// below the handle idle timeout is widened to five times it.
    pub fn clear_window(&self) -> Duration {
        if self.version_clear_timeout < self.handle_idle_timeout {
            self.handle_idle_timeout * 5
        } else {
            self.version_clear_timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.version_capacity, 64);
        assert_eq!(config.max_open_handles, 10);
        assert_eq!(config.handle_idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.version_clear_timeout, Duration::from_secs(86400));
    }

    #[test]
    fn test_clear_window_widened_below_idle_timeout() {
        let config = DbConfig::default()
            .with_handle_idle_timeout(Duration::from_secs(600))
            .with_version_clear_timeout(Duration::from_secs(60));
        assert_eq!(config.clear_window(), Duration::from_secs(3000));
    }

    #[test]
    fn test_clear_window_passthrough() {
        let config = DbConfig::default()
            .with_version_clear_timeout(Duration::from_secs(7200));
        assert_eq!(config.clear_window(), Duration::from_secs(7200));
    }
}
