//! Namespace, collection and key resolution.
//!
//! Each part of a [`RecordKey`] is taken from the first source that has
//! it, highest first:
//!
//! 1. the per-operation [`LocationOverrides`];
//! 2. the object itself (its primary-key and collection-name attributes);
//! 3. the type-level default from its schema;
//! 4. the configured default namespace (namespace only).
//!
//! The collection falls back to the type's simple name.

use crate::config::MapperConfig;
use crate::error::{CoreError, CoreResult};
use crate::mapper::MappedType;
use recbind_storage::{PrimaryKey, RecordKey};

/// Per-operation location overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationOverrides {
    /// Namespace override.
    pub namespace: Option<String>,
    /// Collection override.
    pub collection: Option<String>,
    /// Key override.
    pub key: Option<PrimaryKey>,
}

impl LocationOverrides {
    /// Creates empty overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Overrides the collection.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Overrides the key.
    #[must_use]
    pub fn key(mut self, key: impl Into<PrimaryKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Returns true if nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.collection.is_none() && self.key.is_none()
    }
}

/// Resolves where `object` is stored.
///
/// `object` may be absent when only the type is known, e.g. for reads by
/// key.
///
/// # Errors
///
/// Returns [`CoreError::MissingKey`] or [`CoreError::MissingNamespace`]
/// if no source provides the part, or an attribute error if the
/// object's metadata cannot be read.
pub fn resolve_location<T>(
    overrides: &LocationOverrides,
    object: Option<&T>,
    mapped: &MappedType<T>,
    config: &MapperConfig,
) -> CoreResult<RecordKey> {
    let carried = match object {
        Some(object) => mapped.metadata(object)?,
        None => Default::default(),
    };

    let collection = overrides
        .collection
        .clone()
        .or(carried.collection)
        .or_else(|| mapped.default_collection().map(str::to_string))
        .unwrap_or_else(|| mapped.type_name().to_string());

    let namespace = overrides
        .namespace
        .clone()
        .or_else(|| mapped.default_namespace().map(str::to_string))
        .or_else(|| config.default_namespace.clone())
        .ok_or_else(|| CoreError::MissingNamespace {
            owner: mapped.type_name().to_string(),
            collection: collection.clone(),
        })?;

    let key = overrides
        .key
        .clone()
        .or(carried.key)
        .or_else(|| mapped.default_key().cloned())
        .ok_or_else(|| CoreError::MissingKey {
            owner: mapped.type_name().to_string(),
            collection: collection.clone(),
        })?;

    Ok(RecordKey {
        namespace,
        collection,
        key,
    })
}

/// Resolves the location of every object, or fails before any is used.
///
/// A key override would give every object the same record, so it is
/// rejected.
///
/// # Errors
///
/// Returns the first resolution error; no partial result is returned.
pub fn resolve_all<T>(
    overrides: &LocationOverrides,
    objects: &[T],
    mapped: &MappedType<T>,
    config: &MapperConfig,
) -> CoreResult<Vec<RecordKey>> {
    if overrides.key.is_some() {
        return Err(CoreError::invalid_operation(
            "a key override cannot be applied to a batch",
        ));
    }
    objects
        .iter()
        .map(|object| resolve_location(overrides, Some(object), mapped, config))
        .collect()
}
