// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! One-shot snapshot producers.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::error;

use crate::codec::Codec;
use crate::engine::SnapshotEngine;

use super::error::SnapshotError;

/// Typed put surface handed to a producer while a snapshot is being
/// populated.
///
/// The writer is only valid for the duration of one
/// [`write_once`](super::VersionedDb::write_once) call; keys and values
/// are run through the database's codecs before reaching the engine.
pub struct SnapshotWriter<'a, K, V, E: SnapshotEngine> {
    engine: &'a E,
    handle: &'a E::Handle,
    key_codec: &'a dyn Codec<K>,
    value_codec: &'a dyn Codec<V>,
}

impl<'a, K, V, E: SnapshotEngine> SnapshotWriter<'a, K, V, E> {
    pub(crate) fn new(
        engine: &'a E,
        handle: &'a E::Handle,
        key_codec: &'a dyn Codec<K>,
        value_codec: &'a dyn Codec<V>,
    ) -> Self {
        Self {
            engine,
            handle,
            key_codec,
            value_codec,
        }
    }

    /// Stores one key-value pair in the snapshot under construction.
    pub fn put(&mut self, key: &K, value: &V) -> Result<(), SnapshotError> {
        let key_bytes = self.key_codec.encode(key);
        let value_bytes = self.value_codec.encode(value);
        self.engine.put(self.handle, &key_bytes, &value_bytes)?;
        Ok(())
    }
}

/// Populates a freshly opened writable snapshot in one shot.
///
/// The data source is the producer's own business: memory, files, a
/// network stream. Returning `false` abandons the snapshot; nothing of
/// it becomes visible.
pub trait OnceWriter<K, V, E: SnapshotEngine>: Send + Sync {
    /// Writes the full snapshot contents. Returns whether the snapshot
    /// should be published.
    fn write(&self, snapshot: &mut SnapshotWriter<'_, K, V, E>) -> bool;
}

/// Producer that publishes the contents of an in-memory map.
pub struct MapWriter<K, V> {
    data: HashMap<K, V>,
}

impl<K, V> MapWriter<K, V> {
    /// Wraps a map for one-shot publication.
    pub fn new(data: HashMap<K, V>) -> Self {
        Self { data }
    }
}

impl<K, V, E> OnceWriter<K, V, E> for MapWriter<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Send + Sync,
    E: SnapshotEngine,
{
    fn write(&self, snapshot: &mut SnapshotWriter<'_, K, V, E>) -> bool {
        if self.data.is_empty() {
            return false;
        }
        for (key, value) in &self.data {
            if let Err(e) = snapshot.put(key, value) {
                error!(error = %e, "map producer failed to store entry");
                return false;
            }
        }
        true
    }
}
