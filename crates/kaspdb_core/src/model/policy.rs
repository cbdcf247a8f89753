//! Key and signing policies.

use crate::clause::ClauseTree;
use crate::connection::Connection;
use crate::entity::{Entity, Instance};
use crate::error::CoreResult;
use crate::schema::{FieldDef, Schema};
use kaspdb_value::Value;
use std::sync::LazyLock;

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder("policy")
        .field(FieldDef::text("name").unique())
        .field(FieldDef::text("description").nullable())
        .build()
});

/// A named policy that keys are generated under.
#[derive(Debug, Clone)]
pub struct Policy<'c>(Instance<'c>);

impl<'c> Entity<'c> for Policy<'c> {
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

impl<'c> Policy<'c> {
    /// Returns the policy name.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn name(&self) -> CoreResult<&str> {
        self.0.get_text("name")
    }

    /// Sets the policy name.
    ///
    /// # Errors
    ///
    /// See [`Instance::set`].
    pub fn set_name(&mut self, name: &str) -> CoreResult<()> {
        self.0.set("name", name)
    }

    /// Returns the description, `None` if null.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn description(&self) -> CoreResult<Option<&str>> {
        self.0.get_optional_text("description")
    }

    /// Sets or clears the description.
    ///
    /// # Errors
    ///
    /// See [`Instance::set`].
    pub fn set_description(&mut self, description: Option<&str>) -> CoreResult<()> {
        self.0.set("description", description)
    }

    /// Loads the policy with the given name.
    ///
    /// # Errors
    ///
    /// `NotFound` if no policy has this name.
    pub fn get_by_name(&mut self, name: &str) -> CoreResult<()> {
        let tree = Self::name_clause(name)?;
        self.0.get_by_clause(&tree)
    }

    /// A clause matching policies by name.
    ///
    /// # Errors
    ///
    /// See [`ClauseBuilder::add_equals`](crate::clause::ClauseBuilder::add_equals).
    pub fn name_clause(name: &str) -> CoreResult<ClauseTree> {
        let mut builder = Self::clause();
        builder.add_equals("name", name)?;
        Ok(builder.build())
    }

    /// Creates and stores a policy in one step.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if the name is taken.
    pub fn create_named(
        connection: &'c Connection,
        name: &str,
        description: Option<&str>,
    ) -> CoreResult<Self> {
        let mut policy = Self::new(connection);
        policy.set_name(name)?;
        policy.set_description(description)?;
        policy.create()?;
        Ok(policy)
    }

    /// Returns the primary key for use as a foreign key value.
    #[must_use]
    pub fn key(&self) -> Value {
        self.id().clone()
    }
}
