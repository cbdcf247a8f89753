//! # kaspdb Testkit
//!
//! Test utilities for kaspdb.
//!
//! This crate provides:
//! - Temporary connections for every backend
//! - Property-based test generators using proptest
//! - A key harness that checks stored records against what was written
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kaspdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_on_every_backend() {
//!     for_each_backend(|conn| {
//!         let mut harness = KeyHarness::new(conn, "default").unwrap();
//!         harness.add(&KeySpec::sample("0a1b", KeyRole::Ksk)).unwrap();
//!         harness.verify_all();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use kaspdb_core::model::{DatabaseVersion, HsmKey, KeyBackup, KeyRole, Policy};
    pub use kaspdb_core::{Connection, CoreError, Entity, Value};
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
