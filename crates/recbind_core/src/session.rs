//! Session facade tying mapping, resolution, diffing and storage
//! together.

use crate::cache::ChangeCache;
use crate::config::MapperConfig;
use crate::error::CoreResult;
use crate::large::{LargeList, LargeMap};
use crate::location::{resolve_all, resolve_location, LocationOverrides};
use crate::mapper::{AttributeMapper, Mapped, MappedType};
use recbind_codec::{AttributeMap, CodecError, CodecRegistry, FieldValue, TypeDescriptor};
use recbind_storage::{PrimaryKey, RecordKey, StorageClient, WritePolicy};
use std::sync::Arc;
use tracing::debug;

/// Result of a write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// Where the object was written.
    pub key: RecordKey,
    /// The attributes sent to storage. Empty if nothing changed, or if
    /// only the expiration changed.
    pub written: AttributeMap,
    /// The record's generation after the write; `None` if the write was
    /// skipped.
    pub generation: Option<u32>,
}

impl WriteOutcome {
    /// Returns true if no storage call was made.
    pub fn is_skipped(&self) -> bool {
        self.generation.is_none()
    }
}

/// Maps objects to records through one storage client.
///
/// A session owns its change cache, so deltas are computed against what
/// this session last read or wrote. Sessions are `Send + Sync` and may
/// be shared between threads.
///
/// # Example
///
/// ```rust
/// use recbind_codec::TypeDescriptor;
/// use recbind_core::{Attribute, MapperConfig, Mapped, Schema, Session};
/// use recbind_storage::InMemoryClient;
/// use std::sync::Arc;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Counter {
///     name: String,
///     hits: i64,
/// }
///
/// impl Mapped for Counter {
///     fn schema() -> Schema<Self> {
///         Schema::new()
///             .attribute(
///                 Attribute::new("name", TypeDescriptor::Text, |c: &Counter| c.name.clone().into(), |c, v| {
///                     c.name = v.try_into()?;
///                     Ok(())
///                 })
///                 .primary_key(),
///             )
///             .attribute(Attribute::new("hits", TypeDescriptor::I64, |c: &Counter| c.hits.into(), |c, v| {
///                 c.hits = v.try_into()?;
///                 Ok(())
///             }))
///     }
/// }
///
/// let session = Session::new(Arc::new(InMemoryClient::new()), MapperConfig::new().default_namespace("test"));
/// let mut counter = Counter { name: "home".into(), hits: 1 };
/// session.save(&counter)?;
///
/// counter.hits += 1;
/// let outcome = session.save(&counter)?;
/// assert_eq!(outcome.written.len(), 1);
///
/// let loaded: Option<Counter> = session.load("home")?;
/// assert_eq!(loaded, Some(counter));
/// # Ok::<(), recbind_core::CoreError>(())
/// ```
pub struct Session {
    client: Arc<dyn StorageClient>,
    mapper: AttributeMapper,
    registry: Arc<CodecRegistry>,
    cache: ChangeCache,
    config: MapperConfig,
}

impl Session {
    /// Creates a session with the built-in codecs, plus the JSON
    /// fallback if the configuration enables it.
    pub fn new(client: Arc<dyn StorageClient>, config: MapperConfig) -> Self {
        let registry = if config.json_fallback {
            CodecRegistry::new().with_json_fallback()
        } else {
            CodecRegistry::new()
        };
        Self::with_parts(client, registry, config)
    }

    /// Creates a session with a custom codec registry.
    pub fn with_parts(client: Arc<dyn StorageClient>, registry: CodecRegistry, config: MapperConfig) -> Self {
        let registry = Arc::new(registry);
        Self {
            client,
            mapper: AttributeMapper::with_registry(Arc::clone(&registry)),
            registry,
            cache: ChangeCache::new(config.cache_shards),
            config,
        }
    }

    /// The attribute mapper.
    pub fn mapper(&self) -> &AttributeMapper {
        &self.mapper
    }

    /// The change cache.
    pub fn cache(&self) -> &ChangeCache {
        &self.cache
    }

    /// The configuration.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// The storage client.
    pub fn client(&self) -> &Arc<dyn StorageClient> {
        &self.client
    }

    /// Returns the mapping of `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` cannot be mapped.
    pub fn map_of<T: Mapped>(&self) -> CoreResult<Arc<MappedType<T>>> {
        self.mapper.map_of::<T>()
    }

    /// Resolves where `object` is stored.
    ///
    /// # Errors
    ///
    /// Returns a mapping or resolution error.
    pub fn locate<T: Mapped>(&self, object: &T) -> CoreResult<RecordKey> {
        self.locate_with(object, &LocationOverrides::new())
    }

    /// Resolves where `object` is stored, applying `overrides`.
    ///
    /// # Errors
    ///
    /// Returns a mapping or resolution error.
    pub fn locate_with<T: Mapped>(&self, object: &T, overrides: &LocationOverrides) -> CoreResult<RecordKey> {
        let mapped = self.mapper.map_of::<T>()?;
        resolve_location(overrides, Some(object), &mapped, &self.config)
    }

    /// Writes the attributes of `object` that changed since this session
    /// last read or wrote its record. A changed expiration is written
    /// even when no attribute changed.
    ///
    /// If `T` has a generation attribute holding a non-zero value, the
    /// write only succeeds while the stored generation matches it. `save`
    /// leaves the object untouched; use [`Session::save_mut`] to keep the
    /// generation current across repeated saves.
    ///
    /// # Errors
    ///
    /// Returns a mapping, resolution or storage error. After a storage
    /// error the next save of the record writes every attribute.
    pub fn save<T: Mapped>(&self, object: &T) -> CoreResult<WriteOutcome> {
        self.save_with(object, &LocationOverrides::new())
    }

    /// Like [`Session::save`], then writes the record's new generation
    /// back into `object`.
    ///
    /// # Errors
    ///
    /// See [`Session::save`].
    pub fn save_mut<T: Mapped>(&self, object: &mut T) -> CoreResult<WriteOutcome> {
        let mapped = self.mapper.map_of::<T>()?;
        let key = resolve_location(&LocationOverrides::new(), Some(&*object), &mapped, &self.config)?;
        let outcome = self.write(&mapped, key, &*object)?;
        if let Some(generation) = outcome.generation {
            mapped.inject_generation(object, generation)?;
        }
        Ok(outcome)
    }

    /// Like [`Session::save`], applying `overrides`.
    ///
    /// # Errors
    ///
    /// See [`Session::save`].
    pub fn save_with<T: Mapped>(&self, object: &T, overrides: &LocationOverrides) -> CoreResult<WriteOutcome> {
        let mapped = self.mapper.map_of::<T>()?;
        let key = resolve_location(overrides, Some(object), &mapped, &self.config)?;
        self.write(&mapped, key, object)
    }

    /// Saves every object. All keys are resolved before anything is
    /// written; a resolution failure writes nothing.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error, or the first write error
    /// (objects before it stay written).
    pub fn save_all<T: Mapped>(&self, objects: &[T]) -> CoreResult<Vec<WriteOutcome>> {
        let mapped = self.mapper.map_of::<T>()?;
        let keys = resolve_all(&LocationOverrides::new(), objects, &mapped, &self.config)?;
        objects
            .iter()
            .zip(keys)
            .map(|(object, key)| self.write(&mapped, key, object))
            .collect()
    }

    fn write<T: Mapped>(&self, mapped: &MappedType<T>, key: RecordKey, object: &T) -> CoreResult<WriteOutcome> {
        let snapshot = mapped.extract(object)?;
        let meta = mapped.metadata(object)?;
        let written = self.cache.update(&key, snapshot);
        // Only types with an expiration attribute track it.
        let expiration_changed = meta
            .expiration
            .is_some_and(|expiration| self.cache.swap_expiration(&key, expiration) != Some(expiration));
        if written.is_empty() && !expiration_changed {
            debug!(%key, "nothing changed, skipping put");
            return Ok(WriteOutcome {
                key,
                written,
                generation: None,
            });
        }

        let policy = WritePolicy {
            expected_generation: meta.generation.filter(|g| *g != 0),
            expiration: meta.expiration.unwrap_or_default(),
        };
        match self.client.put(&key, &written, &policy) {
            Ok(generation) => {
                debug!(%key, attributes = written.len(), generation, "saved");
                Ok(WriteOutcome {
                    key,
                    written,
                    generation: Some(generation),
                })
            }
            Err(e) => {
                self.cache.remove(&key);
                Err(e.into())
            }
        }
    }

    /// Reads the `T` stored under `key` in its default namespace and
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns a mapping, resolution, storage or decoding error.
    pub fn load<T: Mapped>(&self, key: impl Into<PrimaryKey>) -> CoreResult<Option<T>> {
        self.load_with(&LocationOverrides::new().key(key))
    }

    /// Reads the `T` at the location given by `overrides` and the type's
    /// defaults.
    ///
    /// # Errors
    ///
    /// See [`Session::load`].
    pub fn load_with<T: Mapped>(&self, overrides: &LocationOverrides) -> CoreResult<Option<T>> {
        let mapped = self.mapper.map_of::<T>()?;
        let key = resolve_location(overrides, None, &mapped, &self.config)?;
        let Some(record) = self.client.get(&key)? else {
            self.cache.remove(&key);
            return Ok(None);
        };

        let mut object = T::default();
        mapped.inject(&mut object, &record.attributes)?;
        mapped.inject_metadata(&mut object, &key, record.generation, record.expiration)?;
        self.cache.insert(&key, record.attributes);
        self.cache.swap_expiration(&key, record.expiration);
        Ok(Some(object))
    }

    /// Deletes the record of `object`.
    ///
    /// # Errors
    ///
    /// Returns a mapping, resolution or storage error.
    pub fn delete<T: Mapped>(&self, object: &T) -> CoreResult<bool> {
        let key = self.locate(object)?;
        self.delete_key(&key)
    }

    /// Deletes the `T` record at the location given by `overrides`.
    ///
    /// # Errors
    ///
    /// See [`Session::delete`].
    pub fn delete_with<T: Mapped>(&self, overrides: &LocationOverrides) -> CoreResult<bool> {
        let mapped = self.mapper.map_of::<T>()?;
        let key = resolve_location(overrides, None, &mapped, &self.config)?;
        self.delete_key(&key)
    }

    fn delete_key(&self, key: &RecordKey) -> CoreResult<bool> {
        self.cache.remove(key);
        let existed = self.client.delete(key)?;
        debug!(%key, existed, "deleted");
        Ok(existed)
    }

    /// Opens a big list on the record of `object`, which may already hold
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns a mapping or resolution error.
    pub fn large_list<T: Mapped, E>(&self, object: &T, attribute: &str, element: TypeDescriptor) -> CoreResult<LargeList<E>>
    where
        E: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
    {
        let key = self.locate(object)?;
        Ok(LargeList::attach(
            Arc::clone(&self.client),
            Arc::clone(&self.registry),
            key,
            attribute,
            element,
            &self.config,
        ))
    }

    /// Opens a big list on a record the caller has just created; the
    /// handle answers reads locally until its first append.
    ///
    /// # Errors
    ///
    /// Returns a mapping or resolution error.
    pub fn new_large_list<T: Mapped, E>(
        &self,
        object: &T,
        attribute: &str,
        element: TypeDescriptor,
    ) -> CoreResult<LargeList<E>>
    where
        E: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
    {
        let key = self.locate(object)?;
        Ok(LargeList::new(
            Arc::clone(&self.client),
            Arc::clone(&self.registry),
            key,
            attribute,
            element,
            &self.config,
        ))
    }

    /// Opens a big map on the record of `object`, which may already hold
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns a mapping or resolution error.
    pub fn large_map<T: Mapped, K, V>(
        &self,
        object: &T,
        attribute: &str,
        types: (TypeDescriptor, TypeDescriptor),
    ) -> CoreResult<LargeMap<K, V>>
    where
        K: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
        V: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
    {
        let key = self.locate(object)?;
        Ok(LargeMap::attach(
            Arc::clone(&self.client),
            Arc::clone(&self.registry),
            key,
            attribute,
            types,
            &self.config,
        ))
    }

    /// Opens a big map on a record the caller has just created.
    ///
    /// # Errors
    ///
    /// Returns a mapping or resolution error.
    pub fn new_large_map<T: Mapped, K, V>(
        &self,
        object: &T,
        attribute: &str,
        types: (TypeDescriptor, TypeDescriptor),
    ) -> CoreResult<LargeMap<K, V>>
    where
        K: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
        V: Into<FieldValue> + TryFrom<FieldValue, Error = CodecError>,
    {
        let key = self.locate(object)?;
        Ok(LargeMap::new(
            Arc::clone(&self.client),
            Arc::clone(&self.registry),
            key,
            attribute,
            types,
            &self.config,
        ))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mapper", &self.mapper)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::mapper::{Attribute, Schema};
    use recbind_codec::Value;
    use recbind_storage::{Expiration, InMemoryClient, StorageError};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Profile {
        id: String,
        name: String,
        visits: i64,
        generation: u32,
        ttl: i64,
    }

    impl Mapped for Profile {
        fn schema() -> Schema<Self> {
            Schema::new()
                .collection("profiles")
                .attribute(
                    Attribute::new("id", TypeDescriptor::Text, |p: &Profile| p.id.clone().into(), |p, v| {
                        p.id = v.try_into()?;
                        Ok(())
                    })
                    .primary_key(),
                )
                .attribute(Attribute::new("name", TypeDescriptor::Text, |p: &Profile| p.name.clone().into(), |p, v| {
                    p.name = v.try_into()?;
                    Ok(())
                }))
                .attribute(Attribute::new("visits", TypeDescriptor::I64, |p: &Profile| p.visits.into(), |p, v| {
                    p.visits = v.try_into()?;
                    Ok(())
                }))
                .attribute(
                    Attribute::new(
                        "generation",
                        TypeDescriptor::I64,
                        |p: &Profile| i64::from(p.generation).into(),
                        |p, v| {
                            let n: i64 = v.try_into()?;
                            p.generation = u32::try_from(n).map_err(|_| CodecError::out_of_range(n, "u32"))?;
                            Ok(())
                        },
                    )
                    .generation(),
                )
                .attribute(
                    Attribute::new("ttl", TypeDescriptor::I64, |p: &Profile| p.ttl.into(), |p, v| {
                        p.ttl = v.try_into()?;
                        Ok(())
                    })
                    .expiration(),
                )
        }
    }

    fn session() -> (Arc<InMemoryClient>, Session) {
        let client = Arc::new(InMemoryClient::new());
        let session = Session::new(client.clone(), MapperConfig::new().default_namespace("test"));
        (client, session)
    }

    fn profile() -> Profile {
        Profile {
            id: "p1".into(),
            name: "Ada".into(),
            visits: 1,
            ..Profile::default()
        }
    }

    #[test]
    fn first_save_writes_everything() {
        let (_, session) = session();
        let outcome = session.save(&profile()).unwrap();
        assert_eq!(outcome.key, RecordKey::new("test", "profiles", "p1"));
        assert_eq!(outcome.written.len(), 2);
    }

    #[test]
    fn second_save_writes_delta() {
        let (_, session) = session();
        let mut p = profile();
        session.save(&p).unwrap();
        p.visits = 2;
        let outcome = session.save(&p).unwrap();
        assert_eq!(outcome.written.keys().collect::<Vec<_>>(), ["visits"]);
    }

    #[test]
    fn unchanged_save_skips_put() {
        let (client, session) = session();
        session.save(&profile()).unwrap();
        client.reset_call_count();
        assert!(session.save(&profile()).unwrap().is_skipped());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn load_restores_object_and_metadata() {
        let (_, session) = session();
        let mut p = profile();
        p.ttl = 300;
        session.save(&p).unwrap();

        let loaded: Profile = session.load("p1").unwrap().unwrap();
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.visits, 1);
        assert_eq!(loaded.generation, 1);
        assert_eq!(loaded.ttl, 300);
        assert!(session.load::<Profile>("missing").unwrap().is_none());
    }

    #[test]
    fn load_seeds_cache() {
        let (_, writer) = session();
        let client = Arc::clone(writer.client());
        writer.save(&profile()).unwrap();

        let reader = Session::new(client, MapperConfig::new().default_namespace("test"));
        let mut loaded: Profile = reader.load("p1").unwrap().unwrap();
        loaded.name = "Grace".into();
        let outcome = reader.save(&loaded).unwrap();
        assert_eq!(outcome.written.keys().collect::<Vec<_>>(), ["name"]);
    }

    #[test]
    fn generation_is_checked() {
        let (_, session) = session();
        session.save(&profile()).unwrap();
        let mut loaded: Profile = session.load("p1").unwrap().unwrap();

        let mut stale = loaded.clone();
        stale.generation = 7;
        stale.visits = 9;
        let err = session.save(&stale).unwrap_err();
        assert!(matches!(err, CoreError::Storage(StorageError::GenerationMismatch { expected: 7, actual: 1 })));
        assert!(err.is_retryable());

        loaded.visits = 9;
        session.save(&loaded).unwrap();
    }

    #[test]
    fn failed_put_forces_full_write() {
        let (client, session) = session();
        let mut p = profile();
        session.save(&p).unwrap();

        p.visits = 5;
        client.fail_next_put("node down");
        assert!(matches!(session.save(&p), Err(CoreError::Storage(StorageError::Engine(_)))));
        assert!(session.cache().get(&RecordKey::new("test", "profiles", "p1")).is_none());

        let outcome = session.save(&p).unwrap();
        assert_eq!(outcome.written.len(), 2);
    }

    #[test]
    fn expiration_is_applied() {
        let (client, session) = session();
        let mut p = profile();
        p.ttl = -1;
        session.save(&p).unwrap();
        let record = client.get(&RecordKey::new("test", "profiles", "p1")).unwrap().unwrap();
        assert_eq!(record.expiration, Expiration::Never);
        assert_eq!(record.attributes.get("name"), Some(&Value::Text("Ada".into())));
    }

    #[test]
    fn expiration_only_change_is_written() {
        let (client, session) = session();
        let key = RecordKey::new("test", "profiles", "p1");
        let mut p = profile();
        session.save(&p).unwrap();

        p.ttl = 3600;
        let outcome = session.save(&p).unwrap();
        assert!(!outcome.is_skipped());
        assert!(outcome.written.is_empty());
        assert_eq!(outcome.generation, Some(2));
        assert_eq!(client.get(&key).unwrap().unwrap().expiration, Expiration::Seconds(3600));

        client.reset_call_count();
        assert!(session.save(&p).unwrap().is_skipped());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn save_mut_keeps_generation_current() {
        let (_, session) = session();
        session.save(&profile()).unwrap();
        let mut loaded: Profile = session.load("p1").unwrap().unwrap();

        loaded.visits = 2;
        assert_eq!(session.save_mut(&mut loaded).unwrap().generation, Some(2));
        assert_eq!(loaded.generation, 2);

        loaded.visits = 3;
        session.save_mut(&mut loaded).unwrap();
        assert_eq!(loaded.generation, 3);

        assert!(session.save_mut(&mut loaded).unwrap().is_skipped());
        assert_eq!(loaded.generation, 3);
    }

    #[test]
    fn save_all_is_all_or_nothing() {
        let (client, session) = session();
        let mut other = profile();
        other.id = "p2".into();
        assert_eq!(session.save_all(&[profile(), other]).unwrap().len(), 2);

        #[derive(Default)]
        struct Keyless;
        impl Mapped for Keyless {
            fn schema() -> Schema<Self> {
                Schema::new()
            }
        }
        client.reset_call_count();
        assert!(matches!(session.save_all(&[Keyless, Keyless]), Err(CoreError::MissingKey { .. })));
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn delete_forgets_cache() {
        let (_, session) = session();
        let p = profile();
        session.save(&p).unwrap();
        assert!(session.delete(&p).unwrap());
        assert!(session.cache().is_empty());
        assert!(!session.delete_with::<Profile>(&LocationOverrides::new().key("p1")).unwrap());
        assert_eq!(session.save(&p).unwrap().written.len(), 2);
    }

    #[test]
    fn overrides_relocate_writes() {
        let (_, session) = session();
        let overrides = LocationOverrides::new().namespace("archive").collection("old");
        let outcome = session.save_with(&profile(), &overrides).unwrap();
        assert_eq!(outcome.key, RecordKey::new("archive", "old", "p1"));
        let loaded: Option<Profile> = session.load_with(&overrides.key("p1")).unwrap();
        assert!(loaded.is_some());
    }

    #[test]
    fn large_collections_follow_object_key() {
        let (_, session) = session();
        let p = profile();
        let fresh: LargeList<String> = session.new_large_list(&p, "history", TypeDescriptor::Text).unwrap();
        fresh.add("signup".into()).unwrap();

        let attached: LargeList<String> = session.large_list(&p, "history", TypeDescriptor::Text).unwrap();
        assert_eq!(attached.size().unwrap(), 1);
        assert_eq!(attached.key(), &RecordKey::new("test", "profiles", "p1"));

        let prefs: LargeMap<String, i64> = session
            .new_large_map(&p, "prefs", (TypeDescriptor::Text, TypeDescriptor::I64))
            .unwrap();
        prefs.put("theme".into(), 2).unwrap();
        let prefs: LargeMap<String, i64> = session
            .large_map(&p, "prefs", (TypeDescriptor::Text, TypeDescriptor::I64))
            .unwrap();
        assert_eq!(prefs.get("theme".into()).unwrap(), Some(2));
    }
}
