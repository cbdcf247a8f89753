//! Built-in entities of the key and signing policy store.

mod database_version;
mod hsm_key;
mod policy;

pub use database_version::DatabaseVersion;
pub use hsm_key::{HsmKey, KeyBackup, KeyRole};
pub use policy::Policy;

use crate::connection::Connection;
use crate::entity::Entity;
use crate::error::CoreResult;
use crate::schema::Schema;

/// Schemas of all built-in entities, referenced schemas first.
#[must_use]
pub fn schemas() -> [&'static Schema; 3] {
    [
        Policy::schema(),
        HsmKey::schema(),
        DatabaseVersion::schema(),
    ]
}

/// Creates storage for every built-in entity.
///
/// # Errors
///
/// Returns the first installation error.
pub fn install(connection: &Connection) -> CoreResult<()> {
    schemas()
        .into_iter()
        .try_for_each(|schema| connection.install(schema))
}
