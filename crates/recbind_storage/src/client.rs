//! Storage client trait definition.

use crate::error::StorageResult;
use crate::key::RecordKey;
use recbind_codec::{AttributeMap, Value};

/// Time-to-live applied to a record on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Use the namespace's configured default.
    #[default]
    NamespaceDefault,
    /// Never expire.
    Never,
    /// Expire after this many seconds.
    Seconds(u32),
}

impl Expiration {
    /// Interprets a TTL attribute value: `-1` never expires, `0` uses the
    /// namespace default, positive values are seconds (saturating).
    pub fn from_ttl(ttl: i64) -> Self {
        match ttl {
            t if t < 0 => Self::Never,
            0 => Self::NamespaceDefault,
            t => Self::Seconds(u32::try_from(t).unwrap_or(u32::MAX)),
        }
    }

    /// The inverse of [`Expiration::from_ttl`].
    pub fn as_ttl(self) -> i64 {
        match self {
            Self::NamespaceDefault => 0,
            Self::Never => -1,
            Self::Seconds(s) => i64::from(s),
        }
    }
}

/// Options applied to a single record write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WritePolicy {
    /// When set, the write succeeds only if the stored generation
    /// equals this value.
    pub expected_generation: Option<u32>,
    /// Record time-to-live.
    pub expiration: Expiration,
}

/// A record as returned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Every stored attribute.
    pub attributes: AttributeMap,
    /// Write counter, incremented by the engine on every write.
    pub generation: u32,
    /// Remaining time-to-live.
    pub expiration: Expiration,
}

/// A record store with named attributes and big-collection primitives.
///
/// The mapper never interprets engine errors other than
/// [`crate::StorageError::DuplicateIndex`]; everything else is passed
/// through to callers unchanged.
///
/// Big lists are addressed by zero-based `i64` index. List appends are
/// create-only: an entry whose index already exists fails the whole
/// call with `DuplicateIndex` and writes nothing. Big-map puts overwrite
/// existing entries.
pub trait StorageClient: Send + Sync {
    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn get(&self, key: &RecordKey) -> StorageResult<Option<Record>>;

    /// Writes `attributes` into the record, creating it if needed, and
    /// returns the record's generation after the write. Attributes not
    /// named are left untouched; an empty `attributes` only applies the
    /// policy's expiration.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails or the generation check
    /// does not hold.
    fn put(&self, key: &RecordKey, attributes: &AttributeMap, policy: &WritePolicy) -> StorageResult<u32>;

    /// Deletes a record, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn delete(&self, key: &RecordKey) -> StorageResult<bool>;

    /// Appends entries to a big list.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIndex` if any index is already taken.
    fn list_append(&self, key: &RecordKey, attribute: &str, entries: Vec<(i64, Value)>) -> StorageResult<()>;

    /// Reads one big-list entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn list_get(&self, key: &RecordKey, attribute: &str, index: i64) -> StorageResult<Option<Value>>;

    /// Reads entries with indices in `from..=to` that exist, in index
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn list_range(&self, key: &RecordKey, attribute: &str, from: i64, to: i64) -> StorageResult<Vec<Value>>;

    /// Checks whether an index exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn list_exists(&self, key: &RecordKey, attribute: &str, index: i64) -> StorageResult<bool>;

    /// Number of entries in a big list.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn list_size(&self, key: &RecordKey, attribute: &str) -> StorageResult<u64>;

    /// Removes every entry with index `>= from`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn list_trim(&self, key: &RecordKey, attribute: &str, from: i64) -> StorageResult<u64>;

    /// Inserts or overwrites big-map entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn map_put(&self, key: &RecordKey, attribute: &str, entries: Vec<(Value, Value)>) -> StorageResult<()>;

    /// Reads one big-map entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn map_get(&self, key: &RecordKey, attribute: &str, entry: &Value) -> StorageResult<Option<Value>>;

    /// Removes a big-map entry, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn map_remove(&self, key: &RecordKey, attribute: &str, entry: &Value) -> StorageResult<bool>;

    /// Number of entries in a big map.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn map_size(&self, key: &RecordKey, attribute: &str) -> StorageResult<u64>;

    /// Every big-map entry, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn map_entries(&self, key: &RecordKey, attribute: &str) -> StorageResult<Vec<(Value, Value)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_conventions() {
        assert_eq!(Expiration::from_ttl(-1), Expiration::Never);
        assert_eq!(Expiration::from_ttl(0), Expiration::NamespaceDefault);
        assert_eq!(Expiration::from_ttl(60), Expiration::Seconds(60));
        assert_eq!(Expiration::from_ttl(i64::MAX), Expiration::Seconds(u32::MAX));
        for ttl in [-1, 0, 3600] {
            assert_eq!(Expiration::from_ttl(ttl).as_ttl(), ttl);
        }
    }
}
