//! Client-side proxies for big collections.
//!
//! A big collection lives beside a record rather than inside it: the
//! engine stores it as a separate indexed list or associative map
//! addressed by `(record key, attribute name)`. [`LargeList`] and
//! [`LargeMap`] wrap those primitives with typed elements, chunked bulk
//! writes and collision retry.
//!
//! # Handle lifecycle
//!
//! ```text
//! Uninitialized --first use--> Bound { known empty | possibly populated }
//! ```
//!
//! Binding resolves the element codecs and makes no storage call. A
//! handle created with `new` starts known-empty: size, reads and
//! existence checks answer locally until the first successful write.
//! Use `attach` for collections that may already hold entries.

mod list;
mod map;
mod retry;

pub use list::LargeList;
pub use map::LargeMap;

use crate::config::{MapperConfig, RetryConfig};
use crate::error::{CoreError, CoreResult};
use recbind_codec::{AttributeOptions, Codec, CodecError, CodecRegistry, FieldValue, TypeDescriptor, Value};
use recbind_storage::{RecordKey, StorageClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Observable state of a big-collection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Not used yet; codecs are unresolved.
    Uninitialized,
    /// Bound, and no entry has ever been written through this handle.
    KnownEmpty,
    /// Bound; the collection may hold entries.
    Bound,
}

struct Bound {
    codecs: Vec<Arc<dyn Codec>>,
}

/// State shared by both adapters.
pub(crate) struct Handle {
    client: Arc<dyn StorageClient>,
    registry: Arc<CodecRegistry>,
    key: RecordKey,
    attribute: String,
    /// List element, or map key then map value.
    slots: Vec<TypeDescriptor>,
    retry: RetryConfig,
    chunk_size: usize,
    bound: OnceLock<Bound>,
    known_empty: AtomicBool,
}

impl Handle {
    #[allow(clippy::too_many_arguments)]
    fn new(
        client: Arc<dyn StorageClient>,
        registry: Arc<CodecRegistry>,
        key: RecordKey,
        attribute: String,
        slots: Vec<TypeDescriptor>,
        config: &MapperConfig,
        chunk_size: usize,
        known_empty: bool,
    ) -> Self {
        Self {
            client,
            registry,
            key,
            attribute,
            slots,
            retry: config.retry.clone(),
            chunk_size: chunk_size.max(1),
            bound: OnceLock::new(),
            known_empty: AtomicBool::new(known_empty),
        }
    }

    fn state(&self) -> HandleState {
        match self.bound.get() {
            None => HandleState::Uninitialized,
            Some(_) if self.is_known_empty() => HandleState::KnownEmpty,
            Some(_) => HandleState::Bound,
        }
    }

    /// Binds on first use. Racing binders resolve the same codecs; one
    /// result is kept.
    fn bind(&self) -> CoreResult<&Bound> {
        if let Some(bound) = self.bound.get() {
            return Ok(bound);
        }
        let codecs = self
            .slots
            .iter()
            .map(|ty| {
                self.registry
                    .resolve(ty, &AttributeOptions::default())
                    .map_err(|e| match e {
                        CodecError::UnsupportedType { .. } => CoreError::UnsupportedType {
                            owner: self.key.to_string(),
                            attribute: self.attribute.clone(),
                            declared: ty.to_string(),
                        },
                        other => self.codec_error(other),
                    })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        trace!(key = %self.key, attribute = %self.attribute, "bound big collection");
        Ok(self.bound.get_or_init(|| Bound { codecs }))
    }

    fn is_known_empty(&self) -> bool {
        self.known_empty.load(Ordering::Acquire)
    }

    fn mark_populated(&self) {
        self.known_empty.store(false, Ordering::Release);
    }

    fn encode(&self, slot: usize, value: FieldValue) -> CoreResult<Value> {
        let bound = self.bind()?;
        bound.codecs[slot]
            .to_storage(&self.slots[slot], &value)
            .map_err(|e| self.codec_error(e))
    }

    fn decode<E>(&self, slot: usize, value: &Value) -> CoreResult<E>
    where
        E: TryFrom<FieldValue, Error = CodecError>,
    {
        let bound = self.bind()?;
        bound.codecs[slot]
            .from_storage(&self.slots[slot], value)
            .and_then(E::try_from)
            .map_err(|e| self.codec_error(e))
    }

    fn codec_error(&self, source: CodecError) -> CoreError {
        CoreError::attribute(self.key.to_string(), self.attribute.clone(), source)
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("key", &self.key)
            .field("attribute", &self.attribute)
            .field("state", &self.state())
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}
