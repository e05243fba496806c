//! Big associative map adapter.

use super::retry::with_collision_retry;
use super::{Handle, HandleState};
use crate::config::MapperConfig;
use crate::error::CoreResult;
use recbind_codec::{CodecError, CodecRegistry, FieldValue, TypeDescriptor, Value};
use recbind_storage::{RecordKey, StorageClient};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// A typed big map. Puts overwrite existing entries.
pub struct LargeMap<K, V> {
    handle: Handle,
    _entries: PhantomData<fn() -> (K, V)>,
}

impl<K, V> LargeMap<K, V>
where
    K: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
    V: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
{
    /// Creates a handle for a map that has never been written.
    pub fn new(
        client: Arc<dyn StorageClient>,
        registry: Arc<CodecRegistry>,
        key: RecordKey,
        attribute: impl Into<String>,
        types: (TypeDescriptor, TypeDescriptor),
        config: &MapperConfig,
    ) -> Self {
        Self::build(client, registry, key, attribute.into(), types, config, true)
    }

    /// Creates a handle for a map that may already hold entries.
    pub fn attach(
        client: Arc<dyn StorageClient>,
        registry: Arc<CodecRegistry>,
        key: RecordKey,
        attribute: impl Into<String>,
        types: (TypeDescriptor, TypeDescriptor),
        config: &MapperConfig,
    ) -> Self {
        Self::build(client, registry, key, attribute.into(), types, config, false)
    }

    fn build(
        client: Arc<dyn StorageClient>,
        registry: Arc<CodecRegistry>,
        key: RecordKey,
        attribute: String,
        (entry_key, value): (TypeDescriptor, TypeDescriptor),
        config: &MapperConfig,
        known_empty: bool,
    ) -> Self {
        Self {
            handle: Handle::new(
                client,
                registry,
                key,
                attribute,
                vec![entry_key, value],
                config,
                config.map_chunk_size,
                known_empty,
            ),
            _entries: PhantomData,
        }
    }

    /// The record holding the map.
    pub fn key(&self) -> &RecordKey {
        &self.handle.key
    }

    /// The attribute name of the map.
    pub fn attribute(&self) -> &str {
        &self.handle.attribute
    }

    /// Current handle state.
    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    fn encode_pair(&self, entry: K, value: V) -> CoreResult<(Value, Value)> {
        Ok((self.handle.encode(0, entry.into())?, self.handle.encode(1, value.into())?))
    }

    /// Inserts or overwrites one entry.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error, or
    /// [`CoreError::DuplicateIndex`](crate::CoreError::DuplicateIndex) if
    /// every retry collided.
    pub fn put(&self, entry: K, value: V) -> CoreResult<()> {
        let pair = self.encode_pair(entry, value)?;
        self.submit(vec![pair])
    }

    /// Inserts or overwrites every entry, one storage call per chunk.
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// See [`LargeMap::put`].
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> CoreResult<usize> {
        let pairs = entries
            .into_iter()
            .map(|(k, v)| self.encode_pair(k, v))
            .collect::<CoreResult<Vec<_>>>()?;

        for chunk in pairs.chunks(self.handle.chunk_size) {
            self.submit(chunk.to_vec())?;
        }
        trace!(key = %self.handle.key, attribute = %self.handle.attribute, written = pairs.len(), "bulk put");
        Ok(pairs.len())
    }

    fn submit(&self, pairs: Vec<(Value, Value)>) -> CoreResult<()> {
        let h = &self.handle;
        with_collision_retry(&h.retry, &h.key, &h.attribute, |_| {
            h.client.map_put(&h.key, &h.attribute, pairs.clone())?;
            Ok(())
        })?;
        h.mark_populated();
        Ok(())
    }

    /// Returns the value stored under `entry`.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error.
    pub fn get(&self, entry: K) -> CoreResult<Option<V>> {
        let h = &self.handle;
        let entry = h.encode(0, entry.into())?;
        if h.is_known_empty() {
            return Ok(None);
        }
        match h.client.map_get(&h.key, &h.attribute, &entry)? {
            Some(value) => h.decode(1, &value).map(Some),
            None => Ok(None),
        }
    }

    /// Returns true if `entry` is present.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error.
    pub fn contains_key(&self, entry: K) -> CoreResult<bool> {
        let h = &self.handle;
        let entry = h.encode(0, entry.into())?;
        if h.is_known_empty() {
            return Ok(false);
        }
        Ok(h.client.map_get(&h.key, &h.attribute, &entry)?.is_some())
    }

    /// Removes `entry`, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error.
    pub fn remove(&self, entry: K) -> CoreResult<bool> {
        let h = &self.handle;
        let entry = h.encode(0, entry.into())?;
        if h.is_known_empty() {
            return Ok(false);
        }
        Ok(h.client.map_remove(&h.key, &h.attribute, &entry)?)
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn size(&self) -> CoreResult<u64> {
        let h = &self.handle;
        h.bind()?;
        if h.is_known_empty() {
            return Ok(0);
        }
        Ok(h.client.map_size(&h.key, &h.attribute)?)
    }

    /// Returns true if the map has no entries.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Every entry, in storage order.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error.
    pub fn entries(&self) -> CoreResult<Vec<(K, V)>> {
        let h = &self.handle;
        h.bind()?;
        if h.is_known_empty() {
            return Ok(Vec::new());
        }
        h.client
            .map_entries(&h.key, &h.attribute)?
            .iter()
            .map(|(k, v)| Ok((h.decode(0, k)?, h.decode(1, v)?)))
            .collect()
    }
}

impl<K, V> std::fmt::Debug for LargeMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeMap").field("handle", &self.handle).finish()
    }
}
