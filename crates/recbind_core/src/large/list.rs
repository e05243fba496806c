//! Big indexed list adapter.

use super::retry::with_collision_retry;
use super::{Handle, HandleState};
use crate::config::MapperConfig;
use crate::error::{CoreError, CoreResult};
use recbind_codec::{CodecError, CodecRegistry, FieldValue, TypeDescriptor, Value};
use recbind_storage::{RecordKey, StorageClient};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// A typed, append-only big list.
///
/// Entries are stored under consecutive zero-based indices. Appends
/// take the current size as the next index; concurrent appenders that
/// pick the same index are resolved by collision retry.
///
/// # Example
///
/// ```rust
/// use recbind_codec::{CodecRegistry, TypeDescriptor};
/// use recbind_core::{LargeList, MapperConfig};
/// use recbind_storage::{InMemoryClient, RecordKey};
/// use std::sync::Arc;
///
/// let list: LargeList<String> = LargeList::new(
///     Arc::new(InMemoryClient::new()),
///     Arc::new(CodecRegistry::new()),
///     RecordKey::new("test", "users", "u1"),
///     "events",
///     TypeDescriptor::Text,
///     &MapperConfig::default(),
/// );
///
/// list.add("login".to_string())?;
/// assert_eq!(list.size()?, 1);
/// assert_eq!(list.get(0)?, Some("login".to_string()));
/// # Ok::<(), recbind_core::CoreError>(())
/// ```
pub struct LargeList<E> {
    handle: Handle,
    _element: PhantomData<fn() -> E>,
}

impl<E> LargeList<E>
where
    E: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
{
    /// Creates a handle for a collection that has never been written.
    pub fn new(
        client: Arc<dyn StorageClient>,
        registry: Arc<CodecRegistry>,
        key: RecordKey,
        attribute: impl Into<String>,
        element: TypeDescriptor,
        config: &MapperConfig,
    ) -> Self {
        Self::build(client, registry, key, attribute.into(), element, config, true)
    }

    /// Creates a handle for a collection that may already hold entries.
    pub fn attach(
        client: Arc<dyn StorageClient>,
        registry: Arc<CodecRegistry>,
        key: RecordKey,
        attribute: impl Into<String>,
        element: TypeDescriptor,
        config: &MapperConfig,
    ) -> Self {
        Self::build(client, registry, key, attribute.into(), element, config, false)
    }

    fn build(
        client: Arc<dyn StorageClient>,
        registry: Arc<CodecRegistry>,
        key: RecordKey,
        attribute: String,
        element: TypeDescriptor,
        config: &MapperConfig,
        known_empty: bool,
    ) -> Self {
        Self {
            handle: Handle::new(
                client,
                registry,
                key,
                attribute,
                vec![element],
                config,
                config.list_chunk_size,
                known_empty,
            ),
            _element: PhantomData,
        }
    }

    /// The record holding the list.
    pub fn key(&self) -> &RecordKey {
        &self.handle.key
    }

    /// The attribute name of the list.
    pub fn attribute(&self) -> &str {
        &self.handle.attribute
    }

    /// Current handle state.
    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    /// Appends one element at the end of the list.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateIndex`] if every retry collided, or
    /// any storage or codec error.
    pub fn add(&self, element: E) -> CoreResult<()> {
        let value = self.handle.encode(0, element.into())?;
        self.submit(vec![value])
    }

    /// Appends every element, one storage call per chunk. Returns the
    /// number of elements added.
    ///
    /// Chunks already written stay written if a later chunk fails.
    ///
    /// # Errors
    ///
    /// See [`LargeList::add`].
    pub fn add_all(&self, elements: impl IntoIterator<Item = E>) -> CoreResult<usize> {
        let values = elements
            .into_iter()
            .map(|e| self.handle.encode(0, e.into()))
            .collect::<CoreResult<Vec<_>>>()?;

        for chunk in values.chunks(self.handle.chunk_size) {
            self.submit(chunk.to_vec())?;
        }
        trace!(key = %self.handle.key, attribute = %self.handle.attribute, added = values.len(), "bulk append");
        Ok(values.len())
    }

    fn submit(&self, values: Vec<Value>) -> CoreResult<()> {
        let h = &self.handle;
        with_collision_retry(&h.retry, &h.key, &h.attribute, |attempt| {
            let base = if attempt == 1 && h.is_known_empty() {
                0
            } else {
                self.remote_size()?
            };
            let entries = values
                .iter()
                .enumerate()
                .map(|(offset, value)| (base + offset as i64, value.clone()))
                .collect();
            h.client.list_append(&h.key, &h.attribute, entries)?;
            Ok(())
        })?;
        h.mark_populated();
        Ok(())
    }

    /// Returns the element at `index`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error.
    pub fn get(&self, index: i64) -> CoreResult<Option<E>> {
        let h = &self.handle;
        h.bind()?;
        if index < 0 || h.is_known_empty() {
            return Ok(None);
        }
        match h.client.list_get(&h.key, &h.attribute, index)? {
            Some(value) => h.decode(0, &value).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the elements at `from..=to`, clamped to the entries that
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRange`] if `to < from`, or a storage
    /// or codec error.
    pub fn range(&self, from: i64, to: i64) -> CoreResult<Vec<E>> {
        let h = &self.handle;
        if to < from {
            return Err(CoreError::InvalidRange {
                key: h.key.to_string(),
                attribute: h.attribute.clone(),
                from,
                to,
            });
        }
        h.bind()?;
        if h.is_known_empty() || to < 0 {
            return Ok(Vec::new());
        }
        h.client
            .list_range(&h.key, &h.attribute, from.max(0), to)?
            .iter()
            .map(|value| h.decode(0, value))
            .collect()
    }

    /// Removes the elements at `from..=last` and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexOutOfBounds`] if `from` is negative or
    /// past the last index, or a storage error.
    pub fn trim(&self, from: i64) -> CoreResult<u64> {
        let h = &self.handle;
        let size = self.size()?;
        if from < 0 || from as u64 >= size {
            return Err(CoreError::IndexOutOfBounds {
                key: h.key.to_string(),
                attribute: h.attribute.clone(),
                index: from,
                size,
            });
        }
        Ok(h.client.list_trim(&h.key, &h.attribute, from)?)
    }

    /// Returns true if an element exists at `index`. Negative and
    /// out-of-range indices are simply absent.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn exists(&self, index: i64) -> CoreResult<bool> {
        let h = &self.handle;
        h.bind()?;
        if index < 0 || h.is_known_empty() {
            return Ok(false);
        }
        Ok(h.client.list_exists(&h.key, &h.attribute, index)?)
    }

    /// Number of elements.
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
        self.remote_size_u64()
    }

    /// Returns true if the list has no elements.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.size()? == 0)
    }

    fn remote_size_u64(&self) -> CoreResult<u64> {
        let h = &self.handle;
        Ok(h.client.list_size(&h.key, &h.attribute)?)
    }

    fn remote_size(&self) -> CoreResult<i64> {
        let size = self.remote_size_u64()?;
        i64::try_from(size).map_err(|_| CoreError::invalid_operation(format!("list size {size} exceeds i64")))
    }
}

impl<E> std::fmt::Debug for LargeList<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeList").field("handle", &self.handle).finish()
    }
}
