//! Attribute mapping between objects and record snapshots.
//!
//! A type describes itself once through [`Mapped::schema`]. The
//! [`AttributeMapper`] turns that description into a [`MappedType`],
//! resolving a codec for every attribute, and caches it by type identity
//! for its own lifetime.

mod mapped;
mod schema;

pub use mapped::{MappedAttribute, MappedType, ObjectMetadata};
pub use schema::{Attribute, AttributeRole, Getter, Mapped, Schema, Setter};

use crate::error::CoreResult;
use parking_lot::RwLock;
use recbind_codec::{AttributeMap, CodecRegistry};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Erased = Arc<dyn Any + Send + Sync>;

/// Builds and caches type mappings.
///
/// Mappings are built on first use and never change afterwards. Two
/// callers racing to map the same type may both build it; the first
/// insert wins and the other build is dropped.
pub struct AttributeMapper {
    registry: Arc<CodecRegistry>,
    types: RwLock<HashMap<TypeId, Erased>>,
}

impl AttributeMapper {
    /// Creates a mapper resolving codecs from `registry`.
    pub fn new(registry: CodecRegistry) -> Self {
        Self::with_registry(Arc::new(registry))
    }

    /// Creates a mapper sharing an existing registry.
    pub fn with_registry(registry: Arc<CodecRegistry>) -> Self {
        Self {
            registry,
            types: RwLock::new(HashMap::new()),
        }
    }

    /// The codec registry in use.
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Returns the mapping of `T`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedType`](crate::CoreError::UnsupportedType)
    /// or [`CoreError::InvalidSchema`](crate::CoreError::InvalidSchema) if
    /// the type cannot be mapped. Failed builds are not cached.
    pub fn map_of<T: Mapped>(&self) -> CoreResult<Arc<MappedType<T>>> {
        let id = TypeId::of::<T>();
        if let Some(found) = self.types.read().get(&id).cloned() {
            return Ok(Self::downcast(found));
        }

        let built: Erased = Arc::new(MappedType::<T>::build(&self.registry)?);
        let entry = {
            let mut types = self.types.write();
            Arc::clone(types.entry(id).or_insert(built))
        };
        debug!(type_name = std::any::type_name::<T>(), "mapped type");
        Ok(Self::downcast(entry))
    }

    /// Extracts the snapshot of `object`.
    ///
    /// # Errors
    ///
    /// Returns an error if the type cannot be mapped or a value cannot be
    /// encoded.
    pub fn extract<T: Mapped>(&self, object: &T) -> CoreResult<AttributeMap> {
        self.map_of::<T>()?.extract(object)
    }

    /// Injects `attributes` into `object`.
    ///
    /// # Errors
    ///
    /// Returns an error if the type cannot be mapped or a value cannot be
    /// decoded.
    pub fn inject<T: Mapped>(&self, object: &mut T, attributes: &AttributeMap) -> CoreResult<()> {
        self.map_of::<T>()?.inject(object, attributes)
    }

    /// Number of types mapped so far.
    pub fn mapped_count(&self) -> usize {
        self.types.read().len()
    }

    fn downcast<T: Mapped>(erased: Erased) -> Arc<MappedType<T>> {
        match erased.downcast::<MappedType<T>>() {
            Ok(mapped) => mapped,
            // Entries are keyed by the TypeId of the type they were built for.
            Err(_) => unreachable!("type cache entry does not match its TypeId"),
        }
    }
}

impl Default for AttributeMapper {
    fn default() -> Self {
        Self::new(CodecRegistry::new())
    }
}

impl std::fmt::Debug for AttributeMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeMapper")
            .field("registry", &self.registry)
            .field("mapped_types", &self.mapped_count())
            .finish()
    }
}
