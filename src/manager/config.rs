// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Manager configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::db::DbConfig;

/// Configuration for a [`MultiDbManager`](super::MultiDbManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Root directory holding one subdirectory per logical database.
    pub data_dir: PathBuf,
    /// Bound on concurrently open databases.
    pub max_open_db: usize,
    /// A cached database unused for this long is closed.
    pub max_idle_time: Duration,
    /// Total on-disk ceiling for the data root, in gibibytes.
    pub max_disk_usage_gb: u64,
    /// Delay before the first maintenance run.
    pub clean_task_delay: Duration,
    /// Interval between maintenance runs.
    pub clean_task_period: Duration,
    /// Configuration forwarded to every database the manager opens.
    pub db: DbConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new("/data/db")
    }
}

impl ManagerConfig {
    /// Creates a configuration rooted at `data_dir` with defaults for
    /// everything else.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_open_db: 300,
            max_idle_time: Duration::from_secs(60 * 60),
            max_disk_usage_gb: 10,
            clean_task_delay: Duration::from_secs(5 * 60),
            clean_task_period: Duration::from_secs(30 * 60),
            db: DbConfig::default(),
        }
    }

    /// Sets the data root.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the open-database bound.
    pub fn with_max_open_db(mut self, max: usize) -> Self {
        self.max_open_db = max;
        self
    }

    /// Sets the idle timeout for cached databases.
    pub fn with_max_idle_time(mut self, timeout: Duration) -> Self {
        self.max_idle_time = timeout;
        self
    }

    /// Sets the disk-usage ceiling in gibibytes.
    pub fn with_max_disk_usage_gb(mut self, gb: u64) -> Self {
        self.max_disk_usage_gb = gb;
        self
    }

    /// Sets the maintenance schedule.
    pub fn with_clean_task_schedule(mut self, delay: Duration, period: Duration) -> Self {
        self.clean_task_delay = delay;
        self.clean_task_period = period;
        self
    }

    /// Sets the per-database configuration.
    pub fn with_db_config(mut self, db: DbConfig) -> Self {
        self.db = db;
        self
    }
}
