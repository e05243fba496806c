//! # recbind storage
//!
//! The storage client boundary for recbind.
//!
//! The mapper does not talk to a storage engine directly. It consumes
//! the [`StorageClient`] trait, which any engine binding implements:
//! record `get`/`put`/`delete` plus big-list and big-map primitives.
//!
//! ## Design Principles
//!
//! - Clients are opaque record stores; they never see in-memory types
//! - `put` writes only the attributes it is given
//! - The only error the mapper interprets is
//!   [`StorageError::DuplicateIndex`]
//! - Clients must be `Send + Sync`
//!
//! ## Available Clients
//!
//! - [`InMemoryClient`] - For testing, with call counting and failure
//!   injection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod key;
mod memory;

pub use client::{Expiration, Record, StorageClient, WritePolicy};
pub use error::{StorageError, StorageResult};
pub use key::{PrimaryKey, RecordKey};
pub use memory::InMemoryClient;
