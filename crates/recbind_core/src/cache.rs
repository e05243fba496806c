//! Differential change cache.
//!
//! The cache remembers the last known full snapshot of every record a
//! session has read or written, so a later write only sends the
//! attributes that actually changed:
//!
//! ```rust
//! use recbind_codec::{AttributeMap, Value};
//! use recbind_core::ChangeCache;
//! use recbind_storage::RecordKey;
//!
//! let cache = ChangeCache::new(4);
//! let key = RecordKey::new("test", "users", "u1");
//!
//! let first: AttributeMap = [("a".to_string(), Value::Integer(1))].into();
//! assert_eq!(cache.update(&key, first.clone()), first);
//! assert!(cache.update(&key, first).is_empty());
//! ```
//!
//! Attributes that disappear from a snapshot are never reported as
//! changed; the write path only adds and overwrites.
//!
//! Expiration is record metadata, not an attribute, so it never shows
//! up in a diff. The cache keeps the expiration last applied to each
//! record beside its snapshot, see [`ChangeCache::swap_expiration`].

use parking_lot::Mutex;
use recbind_codec::AttributeMap;
use recbind_storage::{Expiration, RecordKey};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::trace;

struct Entry {
    snapshot: AttributeMap,
    expiration: Option<Expiration>,
}

impl Entry {
    fn new(snapshot: AttributeMap) -> Self {
        Self {
            snapshot,
            expiration: None,
        }
    }
}

type Shard = Mutex<HashMap<RecordKey, Entry>>;

/// Record key to last known snapshot, sharded by key hash.
///
/// Each shard is guarded by its own mutex, held across the whole
/// read-diff-replace sequence of [`update`](Self::update).
pub struct ChangeCache {
    shards: Box<[Shard]>,
}

impl ChangeCache {
    /// Creates a cache with `shards` independently locked shards (at
    /// least one).
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards }
    }

    fn shard(&self, key: &RecordKey) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Truncation is fine; only the low bits pick the shard.
        let index = hasher.finish() as usize % self.shards.len();
        &self.shards[index]
    }

    /// Records `snapshot` as the new state of `key` and returns the
    /// attributes that differ from the previous state.
    ///
    /// With no previous state the whole snapshot is returned. The stored
    /// entry is replaced by `snapshot`, not merged with it.
    pub fn update(&self, key: &RecordKey, snapshot: AttributeMap) -> AttributeMap {
        let mut shard = self.shard(key).lock();
        if let Some(entry) = shard.get_mut(key) {
            let changed = snapshot
                .iter()
                .filter(|(name, value)| entry.snapshot.get(*name) != Some(*value))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            entry.snapshot = snapshot;
            return changed;
        }

        trace!(%key, "no cached snapshot, writing all attributes");
        shard.insert(key.clone(), Entry::new(snapshot.clone()));
        snapshot
    }

    /// Seeds the state of `key` without diffing, e.g. after a read. Any
    /// recorded expiration is forgotten.
    pub fn insert(&self, key: &RecordKey, snapshot: AttributeMap) {
        self.shard(key).lock().insert(key.clone(), Entry::new(snapshot));
    }

    /// Records `expiration` as the one last applied to `key` and returns
    /// the previously recorded one.
    ///
    /// Keys with no cached snapshot are left alone and yield `None`.
    pub fn swap_expiration(&self, key: &RecordKey, expiration: Expiration) -> Option<Expiration> {
        self.shard(key)
            .lock()
            .get_mut(key)
            .and_then(|entry| entry.expiration.replace(expiration))
    }

    /// Forgets `key`; the next update is a full write.
    pub fn remove(&self, key: &RecordKey) -> Option<AttributeMap> {
        self.shard(key).lock().remove(key).map(|entry| entry.snapshot)
    }

    /// Returns a copy of the cached snapshot of `key`.
    pub fn get(&self, key: &RecordKey) -> Option<AttributeMap> {
        self.shard(key).lock().get(key).map(|entry| entry.snapshot.clone())
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }

    /// Forgets every record.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }
}

impl Default for ChangeCache {
    fn default() -> Self {
        Self::new(16)
    }
}

impl std::fmt::Debug for ChangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeCache")
            .field("shards", &self.shards.len())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recbind_codec::Value;
    use std::sync::Arc;

    fn key(id: &str) -> RecordKey {
        RecordKey::new("test", "items", id)
    }

    fn snapshot(pairs: &[(&str, i64)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::Integer(*v)))
            .collect()
    }

    #[test]
    fn first_write_is_full_write() {
        let cache = ChangeCache::default();
        let full = snapshot(&[("a", 1), ("b", 2)]);
        assert_eq!(cache.update(&key("1"), full.clone()), full);
    }

    #[test]
    fn minimal_diff() {
        let cache = ChangeCache::default();
        cache.update(&key("1"), snapshot(&[("a", 1), ("b", 2)]));
        let changed = cache.update(&key("1"), snapshot(&[("a", 1), ("b", 3), ("c", 4)]));
        assert_eq!(changed, snapshot(&[("b", 3), ("c", 4)]));
    }

    #[test]
    fn idempotent_rewrite() {
        let cache = ChangeCache::default();
        let s = snapshot(&[("a", 1)]);
        cache.update(&key("1"), s.clone());
        assert!(cache.update(&key("1"), s).is_empty());
    }

    #[test]
    fn removed_attributes_are_not_reported() {
        let cache = ChangeCache::default();
        cache.update(&key("1"), snapshot(&[("a", 1), ("b", 2)]));
        assert!(cache.update(&key("1"), snapshot(&[("a", 1)])).is_empty());

        // The entry was replaced, so "b" now counts as new.
        let changed = cache.update(&key("1"), snapshot(&[("a", 1), ("b", 2)]));
        assert_eq!(changed, snapshot(&[("b", 2)]));
    }

    #[test]
    fn nan_rewrite_is_not_a_change() {
        let cache = ChangeCache::default();
        let s: AttributeMap = [("f".to_string(), Value::Float(f64::NAN))].into();
        cache.update(&key("1"), s.clone());
        assert!(cache.update(&key("1"), s).is_empty());
    }

    #[test]
    fn insert_seeds_without_diff() {
        let cache = ChangeCache::new(2);
        cache.insert(&key("1"), snapshot(&[("a", 1)]));
        assert_eq!(cache.update(&key("1"), snapshot(&[("a", 1), ("b", 2)])), snapshot(&[("b", 2)]));
        assert_eq!(cache.get(&key("1")), Some(snapshot(&[("a", 1), ("b", 2)])));
    }

    #[test]
    fn remove_and_clear() {
        let cache = ChangeCache::new(3);
        cache.insert(&key("1"), snapshot(&[("a", 1)]));
        cache.insert(&key("2"), snapshot(&[("a", 1)]));
        assert_eq!(cache.len(), 2);

        assert!(cache.remove(&key("1")).is_some());
        let full = snapshot(&[("a", 1)]);
        assert_eq!(cache.update(&key("1"), full.clone()), full);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn expiration_survives_updates() {
        let cache = ChangeCache::default();
        assert_eq!(cache.swap_expiration(&key("1"), Expiration::Never), None);
        assert!(cache.is_empty());

        cache.update(&key("1"), snapshot(&[("a", 1)]));
        assert_eq!(cache.swap_expiration(&key("1"), Expiration::NamespaceDefault), None);
        cache.update(&key("1"), snapshot(&[("a", 2)]));
        assert_eq!(
            cache.swap_expiration(&key("1"), Expiration::Seconds(60)),
            Some(Expiration::NamespaceDefault)
        );

        cache.insert(&key("1"), snapshot(&[("a", 2)]));
        assert_eq!(cache.swap_expiration(&key("1"), Expiration::Seconds(60)), None);
        cache.remove(&key("1"));
        assert_eq!(cache.swap_expiration(&key("1"), Expiration::Seconds(60)), None);
    }

    #[test]
    fn keys_are_independent() {
        let cache = ChangeCache::new(1);
        cache.update(&key("1"), snapshot(&[("a", 1)]));
        let full = snapshot(&[("a", 1)]);
        assert_eq!(cache.update(&key("2"), full.clone()), full);
    }

    #[test]
    fn concurrent_updates_never_lose_a_change() {
        // Every writer bumps its own attribute; whatever interleaving
        // happens, each bump must appear in exactly one diff.
        let cache = Arc::new(ChangeCache::new(4));
        let k = key("shared");
        cache.insert(&k, AttributeMap::new());

        let state = Arc::new(Mutex::new(AttributeMap::new()));
        let threads: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let state = Arc::clone(&state);
                let k = k.clone();
                std::thread::spawn(move || {
                    let mut seen = 0;
                    for i in 0..100 {
                        let mut current = state.lock();
                        current.insert(format!("w{t}"), Value::Integer(i));
                        let changed = cache.update(&k, current.clone());
                        drop(current);
                        if changed.contains_key(&format!("w{t}")) {
                            seen += 1;
                        }
                    }
                    seen
                })
            })
            .collect();

        for handle in threads {
            assert_eq!(handle.join().unwrap(), 100);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn snapshots() -> impl Strategy<Value = AttributeMap> {
            prop::collection::btree_map("[a-e]", (0i64..4).prop_map(Value::Integer), 0..5)
        }

        proptest! {
            #[test]
            fn delta_applied_to_prior_yields_new(prior in snapshots(), next in snapshots()) {
                let cache = ChangeCache::new(2);
                let k = key("p");
                cache.insert(&k, prior.clone());
                let changed = cache.update(&k, next.clone());

                let mut merged = prior.clone();
                merged.extend(changed.clone());
                for (name, value) in &next {
                    prop_assert_eq!(merged.get(name), Some(value));
                }
                for (name, value) in &changed {
                    prop_assert_eq!(next.get(name), Some(value));
                    prop_assert_ne!(prior.get(name), Some(value));
                }
                prop_assert_eq!(cache.get(&k), Some(next));
            }
        }
    }
}
