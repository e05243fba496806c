//! In-memory storage client for testing.

use crate::client::{Expiration, Record, StorageClient, WritePolicy};
use crate::error::{StorageError, StorageResult};
use crate::key::RecordKey;
use parking_lot::{Mutex, RwLock};
use recbind_codec::{AttributeMap, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A record's attributes are held CBOR-encoded, so every read hands back
/// freshly decoded values the way a real engine would.
#[derive(Debug)]
struct StoredRecord {
    encoded: Vec<u8>,
    generation: u32,
    expiration: Expiration,
}

type CollectionKey = (RecordKey, String);

/// An in-memory [`StorageClient`].
///
/// Suitable for unit and integration tests. Besides storing data it
/// counts every call made through the trait and can inject failures:
/// duplicate-index collisions on big-collection writes, or an engine
/// error on the next `put`.
///
/// # Example
///
/// ```rust
/// use recbind_codec::{AttributeMap, Value};
/// use recbind_storage::{InMemoryClient, RecordKey, StorageClient, WritePolicy};
///
/// let client = InMemoryClient::new();
/// let key = RecordKey::new("test", "users", "alice");
/// let mut attrs = AttributeMap::new();
/// attrs.insert("age".into(), Value::Integer(30));
///
/// client.put(&key, &attrs, &WritePolicy::default()).unwrap();
/// let record = client.get(&key).unwrap().unwrap();
/// assert_eq!(record.attributes, attrs);
/// assert_eq!(record.generation, 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryClient {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
    lists: RwLock<HashMap<CollectionKey, BTreeMap<i64, Value>>>,
    maps: RwLock<HashMap<CollectionKey, Vec<(Value, Value)>>>,
    calls: AtomicU64,
    pending_collisions: AtomicU32,
    pending_put_failure: Mutex<Option<String>>,
}

impl InMemoryClient {
    /// Creates an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls made so far.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Resets the call counter to zero.
    pub fn reset_call_count(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    /// Makes the next `n` big-collection writes fail with
    /// [`StorageError::DuplicateIndex`] without writing anything.
    pub fn inject_collisions(&self, n: u32) {
        self.pending_collisions.store(n, Ordering::SeqCst);
    }

    /// Makes the next `put` fail with [`StorageError::Engine`].
    pub fn fail_next_put(&self, message: impl Into<String>) {
        *self.pending_put_failure.lock() = Some(message.into());
    }

    /// Number of stored records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    fn track(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn take_collision(&self, attribute: &str, index: impl ToString) -> StorageResult<()> {
        let taken = self
            .pending_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match taken {
            Ok(_) => Err(StorageError::DuplicateIndex {
                attribute: attribute.to_string(),
                index: index.to_string(),
            }),
            Err(_) => Ok(()),
        }
    }

    fn encode(attributes: &AttributeMap) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(attributes, &mut buf).map_err(|e| StorageError::Corrupted(e.to_string()))?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> StorageResult<AttributeMap> {
        ciborium::from_reader(bytes).map_err(|e| StorageError::Corrupted(e.to_string()))
    }

    fn collection_key(key: &RecordKey, attribute: &str) -> CollectionKey {
        (key.clone(), attribute.to_string())
    }
}

impl StorageClient for InMemoryClient {
    fn get(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
        self.track();
        let records = self.records.read();
        match records.get(key) {
            Some(stored) => Ok(Some(Record {
                attributes: Self::decode(&stored.encoded)?,
                generation: stored.generation,
                expiration: stored.expiration,
            })),
            None => Ok(None),
        }
    }

    fn put(&self, key: &RecordKey, attributes: &AttributeMap, policy: &WritePolicy) -> StorageResult<u32> {
        self.track();
        if let Some(message) = self.pending_put_failure.lock().take() {
            return Err(StorageError::Engine(message));
        }

        let mut records = self.records.write();
        let current = records.get(key);
        let actual = current.map_or(0, |r| r.generation);
        if let Some(expected) = policy.expected_generation {
            if expected != actual {
                return Err(StorageError::GenerationMismatch { expected, actual });
            }
        }

        let mut merged = match current {
            Some(stored) => Self::decode(&stored.encoded)?,
            None => AttributeMap::new(),
        };
        merged.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));

        let generation = actual.wrapping_add(1);
        records.insert(
            key.clone(),
            StoredRecord {
                encoded: Self::encode(&merged)?,
                generation,
                expiration: policy.expiration,
            },
        );
        Ok(generation)
    }

    fn delete(&self, key: &RecordKey) -> StorageResult<bool> {
        self.track();
        let existed = self.records.write().remove(key).is_some();
        self.lists.write().retain(|(k, _), _| k != key);
        self.maps.write().retain(|(k, _), _| k != key);
        Ok(existed)
    }

    fn list_append(&self, key: &RecordKey, attribute: &str, entries: Vec<(i64, Value)>) -> StorageResult<()> {
        self.track();
        if let Some((first, _)) = entries.first() {
            self.take_collision(attribute, first)?;
        }

        let mut lists = self.lists.write();
        let list = lists.entry(Self::collection_key(key, attribute)).or_default();
        if let Some((index, _)) = entries.iter().find(|(index, _)| list.contains_key(index)) {
            return Err(StorageError::DuplicateIndex {
                attribute: attribute.to_string(),
                index: index.to_string(),
            });
        }
        list.extend(entries);
        Ok(())
    }

    fn list_get(&self, key: &RecordKey, attribute: &str, index: i64) -> StorageResult<Option<Value>> {
        self.track();
        Ok(self
            .lists
            .read()
            .get(&Self::collection_key(key, attribute))
            .and_then(|list| list.get(&index).cloned()))
    }

    fn list_range(&self, key: &RecordKey, attribute: &str, from: i64, to: i64) -> StorageResult<Vec<Value>> {
        self.track();
        if to < from {
            return Ok(Vec::new());
        }
        Ok(self
            .lists
            .read()
            .get(&Self::collection_key(key, attribute))
            .map(|list| list.range(from..=to).map(|(_, v)| v.clone()).collect())
            .unwrap_or_default())
    }

    fn list_exists(&self, key: &RecordKey, attribute: &str, index: i64) -> StorageResult<bool> {
        self.track();
        Ok(self
            .lists
            .read()
            .get(&Self::collection_key(key, attribute))
            .is_some_and(|list| list.contains_key(&index)))
    }

    fn list_size(&self, key: &RecordKey, attribute: &str) -> StorageResult<u64> {
        self.track();
        Ok(self
            .lists
            .read()
            .get(&Self::collection_key(key, attribute))
            .map_or(0, |list| list.len() as u64))
    }

    fn list_trim(&self, key: &RecordKey, attribute: &str, from: i64) -> StorageResult<u64> {
        self.track();
        let mut lists = self.lists.write();
        let Some(list) = lists.get_mut(&Self::collection_key(key, attribute)) else {
            return Ok(0);
        };
        let removed = list.split_off(&from);
        Ok(removed.len() as u64)
    }

    fn map_put(&self, key: &RecordKey, attribute: &str, entries: Vec<(Value, Value)>) -> StorageResult<()> {
        self.track();
        if let Some((first, _)) = entries.first() {
            self.take_collision(attribute, format!("{first:?}"))?;
        }

        let mut maps = self.maps.write();
        let map = maps.entry(Self::collection_key(key, attribute)).or_default();
        for (entry, value) in entries {
            match map.iter_mut().find(|(k, _)| *k == entry) {
                Some(slot) => slot.1 = value,
                None => map.push((entry, value)),
            }
        }
        Ok(())
    }

    fn map_get(&self, key: &RecordKey, attribute: &str, entry: &Value) -> StorageResult<Option<Value>> {
        self.track();
        Ok(self
            .maps
            .read()
            .get(&Self::collection_key(key, attribute))
            .and_then(|map| map.iter().find(|(k, _)| k == entry).map(|(_, v)| v.clone())))
    }

    fn map_remove(&self, key: &RecordKey, attribute: &str, entry: &Value) -> StorageResult<bool> {
        self.track();
        let mut maps = self.maps.write();
        let Some(map) = maps.get_mut(&Self::collection_key(key, attribute)) else {
            return Ok(false);
        };
        let before = map.len();
        map.retain(|(k, _)| k != entry);
        Ok(map.len() != before)
    }

    fn map_size(&self, key: &RecordKey, attribute: &str) -> StorageResult<u64> {
        self.track();
        Ok(self
            .maps
            .read()
            .get(&Self::collection_key(key, attribute))
            .map_or(0, |map| map.len() as u64))
    }

    fn map_entries(&self, key: &RecordKey, attribute: &str) -> StorageResult<Vec<(Value, Value)>> {
        self.track();
        Ok(self
            .maps
            .read()
            .get(&Self::collection_key(key, attribute))
            .cloned()
            .unwrap_or_default())
    }
}
