// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Fixed-layout version record file.
//!
//! Every logical database keeps one `_VERSION` file next to its snapshot
//! directories. The file is memory-mapped and shared by every process that
//! opens the database; it carries the published current version and one
//! last-access record per allowable version.
//!
//! # File layout
//!
//! The file is exactly `4 + capacity * 12` bytes, little-endian:
//!
//! ```text
//! offset 0              4 bytes   current version (i32, 0 = empty database)
//! offset 4 + (v-1)*12   4 bytes   version tag (i32, 0 until first write)
//!                       8 bytes   last-access value (i64, see below)
//! ```
//!
//! A record value of `0` means the version was never opened, a positive
//! value is the Unix-millisecond timestamp of the most recent read-only
//! open, and [`CLEARING`] marks a version whose directory is being
//! reclaimed. Mutations go through compare-and-set operations gated by
//! non-blocking byte-range advisory locks, so cooperating processes never
//! block on each other.

mod error;
mod fvr;
mod range_lock;

pub use error::RecordError;
pub use fvr::{FixedVersionRecord, CLEARING, DEFAULT_RECORDS, MAX_RECORDS};
pub use range_lock::RangeLockGuard;
