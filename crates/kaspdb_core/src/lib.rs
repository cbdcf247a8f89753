//! # kaspdb Core
//!
//! Backend-agnostic object mapping for the kaspdb DNSSEC key store.
//!
//! Entities are described once by a [`Schema`] and persisted through a
//! [`Connection`] to either backend:
//!
//! - [`backend::SqliteBackend`] - relational storage through SQLite
//! - [`backend::DocumentBackend`] - embedded document store with revision
//!   tokens, in memory or persisted to a file
//!
//! Queries are expressed as a [`ClauseTree`] and translated by the backend;
//! results stream through a lazy [`ResultCursor`]. Typed entities implement
//! [`Entity`] over an [`Instance`] and get create, read, update, delete and
//! listing for free.
//!
//! ## Example
//!
//! ```rust
//! use kaspdb_core::model::{self, HsmKey, KeyBackup, KeyRole, Policy};
//! use kaspdb_core::{Config, Connection, Entity};
//!
//! let conn = Connection::open(&Config::sqlite_in_memory()).unwrap();
//! model::install(&conn).unwrap();
//!
//! let policy = Policy::create_named(&conn, "default", None).unwrap();
//! let mut key = HsmKey::new(&conn);
//! key.set_policy_id(policy.key()).unwrap();
//! key.set_locator("6b3f").unwrap();
//! key.set_candidate_for_sharing(0).unwrap();
//! key.set_bits(2048).unwrap();
//! key.set_policy_name("default").unwrap();
//! key.set_algorithm(8).unwrap();
//! key.set_role(KeyRole::Ksk).unwrap();
//! key.set_inception(0).unwrap();
//! key.set_is_revoked(0).unwrap();
//! key.set_key_type("RSA").unwrap();
//! key.set_repository("SoftHSM").unwrap();
//! key.set_backup(KeyBackup::NotRequired).unwrap();
//! key.create().unwrap();
//!
//! let mut found = HsmKey::new(&conn);
//! found.get_by_locator("6b3f").unwrap();
//! assert_eq!(found.role_text().unwrap(), "KSK");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
mod clause;
mod config;
mod connection;
mod cursor;
mod entity;
mod enumeration;
mod error;
pub mod model;
mod object;
mod record;
mod schema;
pub mod schema_version;

pub use clause::{Clause, ClauseBuilder, ClauseTree, Comparator, Connective};
pub use config::{BackendConfig, Config, ConfigurationList, DocumentLocation};
pub use connection::Connection;
pub use cursor::ResultCursor;
pub use entity::{Entity, EntityList, Instance, Lifecycle};
pub use enumeration::{DbEnum, EnumSet};
pub use error::{CoreError, CoreResult};
pub use object::{Created, DbObject};
pub use record::{Record, Row};
pub use schema::{FieldDef, FieldType, Schema, SchemaBuilder};
pub use schema_version::{VersionStatus, CURRENT_VERSION};

pub use kaspdb_value::{EnumValue, Value, ValueError, ValueKind};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
