// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The snapshot engine contract.

use std::path::Path;

use super::error::EngineError;

/// Narrow contract over an embedded key-value engine operating on one
/// directory per snapshot.
///
/// Handles are also closed by dropping them; [`SnapshotEngine::close`]
/// exists so that writable handles can flush durably before release.
/// After a writable handle is closed, a read-only open of the same
/// directory (in this process or another) must see every byte that was
/// put.
pub trait SnapshotEngine: Send + Sync + 'static {
    /// An opened engine instance bound to one snapshot directory.
    type Handle: Send + Sync;

    /// Creates or opens a writable instance at `dir`.
    fn open_writable(&self, dir: &Path) -> Result<Self::Handle, EngineError>;

    /// Opens an existing snapshot read-only.
    fn open_readonly(&self, dir: &Path) -> Result<Self::Handle, EngineError>;

    /// Stores one key-value pair.
    fn put(&self, handle: &Self::Handle, key: &[u8], value: &[u8]) -> Result<(), EngineError>;

    /// Point lookup; `None` when the key is absent.
    fn get(&self, handle: &Self::Handle, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;

    /// Batch lookup; the result is positionally aligned with `keys`.
    fn multi_get(
        &self,
        handle: &Self::Handle,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Option<Vec<u8>>>, EngineError>;

    /// Closes a handle, flushing writable instances durably first.
    fn close(&self, handle: Self::Handle) -> Result<(), EngineError>;
}
