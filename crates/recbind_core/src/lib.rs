//! # recbind core
//!
//! Maps application objects to records with named attributes.
//!
//! This crate provides:
//! - [`AttributeMapper`] - builds and caches a [`MappedType`] per type
//!   from its [`Mapped::schema`], with a codec bound to every attribute
//! - [`ChangeCache`] - remembers the last known snapshot per record so
//!   writes only carry changed attributes
//! - [`resolve_location`] - picks namespace, collection and key from
//!   overrides, the object, type defaults and configuration
//! - [`LargeList`] / [`LargeMap`] - typed proxies for big collections,
//!   with chunked writes and collision retry
//! - [`Session`] - the read and write paths over a
//!   [`StorageClient`](recbind_storage::StorageClient)
//!
//! ## Write path
//!
//! 1. Resolve the record key of the object.
//! 2. Extract the object's snapshot through its codecs.
//! 3. Diff the snapshot against the cached one.
//! 4. Put only the changed attributes; cache the new snapshot.
//!
//! Reads go the other way and seed the cache with what was read.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod large;
mod location;
mod mapper;
mod session;

pub use cache::ChangeCache;
pub use config::{MapperConfig, RetryConfig};
pub use error::{CoreError, CoreResult};
pub use large::{HandleState, LargeList, LargeMap};
pub use location::{resolve_all, resolve_location, LocationOverrides};
pub use mapper::{
    Attribute, AttributeMapper, AttributeRole, Getter, Mapped, MappedAttribute, MappedType, ObjectMetadata, Schema,
    Setter,
};
pub use session::{Session, WriteOutcome};
