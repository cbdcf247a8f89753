//! The schema version marker.

use crate::clause::ClauseBuilder;
use crate::entity::{Entity, Instance};
use crate::error::CoreResult;
use crate::schema::{FieldDef, Schema};
use std::sync::LazyLock;

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder("database_version")
        .field(FieldDef::uint32("version"))
        .build()
});

/// Records which schema version the stored data follows.
///
/// A database holds at most one of these; see [`crate::schema_version`].
#[derive(Debug, Clone)]
pub struct DatabaseVersion<'c>(Instance<'c>);

impl<'c> Entity<'c> for DatabaseVersion<'c> {
    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn from_instance(instance: Instance<'c>) -> Self {
        Self(instance)
    }

    fn instance(&self) -> &Instance<'c> {
        &self.0
    }

    fn instance_mut(&mut self) -> &mut Instance<'c> {
        &mut self.0
    }
}

impl DatabaseVersion<'_> {
    /// Returns the version number.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn version(&self) -> CoreResult<u32> {
        self.0.get_uint32("version")
    }

    /// Sets the version number.
    ///
    /// # Errors
    ///
    /// See [`Instance::set`].
    pub fn set_version(&mut self, version: u32) -> CoreResult<()> {
        self.0.set("version", version)
    }

    /// Adds `version = version` to `builder`.
    ///
    /// # Errors
    ///
    /// Only for a builder of another schema.
    pub fn version_clause(builder: &mut ClauseBuilder, version: u32) -> CoreResult<&mut ClauseBuilder> {
        builder.add_equals("version", version)
    }
}
