//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting between in-memory and
/// storage values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No codec accepts the declared type and no fallback is configured.
    #[error("unsupported type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// A codec was handed an in-memory value outside its domain.
    #[error("codec {codec} cannot encode {found}")]
    UnexpectedValue {
        /// Codec name.
        codec: &'static str,
        /// Description of the value that was supplied.
        found: String,
    },

    /// A stored value has a kind the codec cannot decode.
    #[error("codec {codec} expected {expected}, found {found}")]
    UnexpectedKind {
        /// Codec name.
        codec: &'static str,
        /// Storage kind the codec expected.
        expected: &'static str,
        /// Storage kind actually found.
        found: &'static str,
    },

    /// An enumeration name did not match any declared variant.
    #[error("unknown variant {variant:?} for enum {enum_name}")]
    UnknownVariant {
        /// The enumeration type.
        enum_name: String,
        /// The stored name.
        variant: String,
    },

    /// A narrowing conversion lost information.
    #[error("value {value} out of range for {target}")]
    OutOfRange {
        /// The stored value.
        value: String,
        /// The declared in-memory type.
        target: &'static str,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {message}")]
    Json {
        /// Description of the failure.
        message: String,
    },
}

impl CodecError {
    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create an unexpected value error.
    pub fn unexpected_value(codec: &'static str, found: impl Into<String>) -> Self {
        Self::UnexpectedValue {
            codec,
            found: found.into(),
        }
    }

    /// Create an unexpected kind error.
    pub fn unexpected_kind(codec: &'static str, expected: &'static str, found: &'static str) -> Self {
        Self::UnexpectedKind {
            codec,
            expected,
            found,
        }
    }

    /// Create an out of range error.
    pub fn out_of_range(value: impl ToString, target: &'static str) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target,
        }
    }

    /// Create a JSON error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::json(err.to_string())
    }
}
