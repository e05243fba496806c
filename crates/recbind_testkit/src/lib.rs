//! # recbind testkit
//!
//! Test utilities for recbind.
//!
//! This crate provides:
//! - Mapped fixture types covering every built-in codec
//! - Session helpers over the in-memory client
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent appends and saves
//!
//! ## Usage
//!
//! ```rust
//! use recbind_testkit::prelude::*;
//!
//! with_session(|s| {
//!     let customer = Customer::sample("c1");
//!     s.save(&customer).unwrap();
//!     let loaded: Customer = s.load("c1").unwrap().unwrap();
//!     assert_eq!(loaded.name, customer.name);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
