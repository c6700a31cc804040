// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Multi-database management.
//!
//! A [`MultiDbManager`] owns the data root. It keeps a bounded cache of
//! open databases, runs one background maintenance worker that retires
//! expired snapshot versions and idle databases, and enforces a total
//! disk-usage ceiling across every database under the root.

mod config;
mod error;
mod multi;

pub use config::ManagerConfig;
pub use error::ManagerError;
pub use multi::MultiDbManager;
