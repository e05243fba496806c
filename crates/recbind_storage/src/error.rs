//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by a storage client.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A big-collection write used an index or entry key that already
    /// exists. Concurrent appenders race for the same index; retrying
    /// with a freshly computed index resolves it.
    #[error("duplicate index {index} in {attribute}")]
    DuplicateIndex {
        /// Attribute holding the big collection.
        attribute: String,
        /// The clashing index, rendered for display.
        index: String,
    },

    /// The record's generation did not match the expected generation.
    #[error("generation mismatch: expected {expected}, found {actual}")]
    GenerationMismatch {
        /// Generation the writer expected.
        expected: u32,
        /// Generation currently stored.
        actual: u32,
    },

    /// The record does not exist.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// The stored data could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The client is closed or disconnected.
    #[error("storage is closed")]
    Closed,

    /// Any other engine failure, passed through verbatim.
    #[error("engine error: {0}")]
    Engine(String),
}

impl StorageError {
    /// Returns true if this is the duplicate-index collision signal.
    pub fn is_duplicate_index(&self) -> bool {
        matches!(self, Self::DuplicateIndex { .. })
    }
}
