//! Record addressing.

use std::fmt;

/// The user part of a record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryKey {
    /// String key.
    Text(String),
    /// 64-bit integer key.
    Integer(i64),
    /// Opaque composite key, already encoded by the caller.
    Opaque(Vec<u8>),
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Opaque(bytes) => {
                f.write_str("0x")?;
                bytes.iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
        }
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for PrimaryKey {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<Vec<u8>> for PrimaryKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Opaque(bytes)
    }
}

/// The fully resolved location of a record.
///
/// Built fresh for every operation and never cached by the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Namespace.
    pub namespace: String,
    /// Collection (set) name within the namespace.
    pub collection: String,
    /// Primary key within the collection.
    pub key: PrimaryKey,
}

impl RecordKey {
    /// Creates a record key.
    pub fn new(namespace: impl Into<String>, collection: impl Into<String>, key: impl Into<PrimaryKey>) -> Self {
        Self {
            namespace: namespace.into(),
            collection: collection.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.collection, self.key)
    }
}
