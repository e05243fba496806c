//! # recbind codec
//!
//! Conversion between in-memory attribute values and the value kinds a
//! record store can hold.
//!
//! This crate provides:
//! - [`Value`], the closed set of storage kinds (integer, float, text,
//!   bytes, list, map)
//! - [`FieldValue`] and [`TypeDescriptor`], the in-memory side
//! - the [`Codec`] trait and its built-in implementations
//! - [`CodecRegistry`], which picks a codec for a declared type
//!
//! ## Usage
//!
//! ```
//! use recbind_codec::{AttributeOptions, CodecRegistry, FieldValue, TypeDescriptor, Value};
//!
//! let registry = CodecRegistry::new();
//! let codec = registry
//!     .resolve(&TypeDescriptor::Bool, &AttributeOptions::default())
//!     .unwrap();
//!
//! let stored = codec.to_storage(&TypeDescriptor::Bool, &FieldValue::Bool(true)).unwrap();
//! assert_eq!(stored, Value::Integer(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod collection;
mod error;
mod json;
mod native;
mod registry;
mod value;

pub use codec::{
    BoolCodec, Codec, EnumCodec, FixedPointCodec, PassThroughCodec, TimestampCodec, WideningCodec,
};
pub use collection::CollectionCodec;
pub use error::{CodecError, CodecResult};
pub use json::{to_json, JsonCodec};
pub use native::{FieldValue, TypeDescriptor};
pub use registry::{AttributeOptions, CodecRegistry};
pub use value::{AttributeMap, Value};
