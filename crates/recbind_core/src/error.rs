//! Error types for recbind core.

use recbind_codec::CodecError;
use recbind_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in mapping, resolution and big-collection
/// operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage client error, passed through unchanged.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Codec error outside any attribute context.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No codec accepts an attribute's declared type.
    #[error("unsupported type {declared} for attribute {owner}.{attribute}")]
    UnsupportedType {
        /// The mapped type.
        owner: String,
        /// The attribute's in-memory name.
        attribute: String,
        /// The declared type.
        declared: String,
    },

    /// A type's schema violates a mapping rule.
    #[error("invalid schema for {owner}: {message}")]
    InvalidSchema {
        /// The mapped type.
        owner: String,
        /// What is wrong.
        message: String,
    },

    /// Converting an attribute value failed.
    #[error("attribute {owner}.{attribute}: {source}")]
    Attribute {
        /// The mapped type.
        owner: String,
        /// The attribute's in-memory name.
        attribute: String,
        /// The underlying codec error.
        source: CodecError,
    },

    /// No primary key could be determined.
    #[error("no key for {owner} in collection {collection}")]
    MissingKey {
        /// The mapped type.
        owner: String,
        /// The resolved collection.
        collection: String,
    },

    /// No namespace could be determined.
    #[error("no namespace for {owner} in collection {collection}")]
    MissingNamespace {
        /// The mapped type.
        owner: String,
        /// The resolved collection.
        collection: String,
    },

    /// A range's end precedes its start.
    #[error("invalid range {from}..={to} on {key}/{attribute}")]
    InvalidRange {
        /// Record holding the collection.
        key: String,
        /// Collection attribute.
        attribute: String,
        /// Requested start.
        from: i64,
        /// Requested end.
        to: i64,
    },

    /// An index lies outside the collection.
    #[error("index {index} out of bounds for {key}/{attribute} of size {size}")]
    IndexOutOfBounds {
        /// Record holding the collection.
        key: String,
        /// Collection attribute.
        attribute: String,
        /// Requested index.
        index: i64,
        /// Collection size at the time of the check.
        size: u64,
    },

    /// Every collision retry clashed with a concurrent writer.
    #[error("duplicate index on {key}/{attribute} after {attempts} attempts")]
    DuplicateIndex {
        /// Record holding the collection.
        key: String,
        /// Collection attribute.
        attribute: String,
        /// Attempts made.
        attempts: u32,
    },

    /// Operation not permitted with the given arguments.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid schema error.
    pub fn invalid_schema(owner: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            owner: owner.into(),
            message: message.into(),
        }
    }

    /// Wraps a codec error with attribute context.
    pub fn attribute(owner: impl Into<String>, attribute: impl Into<String>, source: CodecError) -> Self {
        Self::Attribute {
            owner: owner.into(),
            attribute: attribute.into(),
            source,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Configuration and argument errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIndex { .. } | Self::Storage(StorageError::GenerationMismatch { .. })
        )
    }
}
