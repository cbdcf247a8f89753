//! Keys held in a hardware security module.

use super::Policy;
use crate::clause::{ClauseBuilder, ClauseTree};
use crate::connection::Connection;
use crate::entity::{Entity, EntityList, Instance};
use crate::enumeration::{DbEnum, EnumSet};
use crate::error::CoreResult;
use crate::schema::{FieldDef, Schema};
use kaspdb_value::Value;
use std::sync::LazyLock;

static ROLES: LazyLock<EnumSet> =
    LazyLock::new(|| EnumSet::new("hsm_key_role", &[("KSK", 1), ("ZSK", 2), ("CSK", 3)]));

static BACKUPS: LazyLock<EnumSet> = LazyLock::new(|| {
    EnumSet::new(
        "hsm_key_backup",
        &[
            ("Not Required", 0),
            ("Required", 1),
            ("Requested", 2),
            ("Done", 3),
        ],
    )
});

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder("hsm_key")
        .field(FieldDef::foreign_key("policy_id", "policy"))
        .field(FieldDef::text("locator").unique())
        .field(FieldDef::uint32("candidate_for_sharing"))
        .field(FieldDef::uint32("bits"))
        .field(FieldDef::text("policy"))
        .field(FieldDef::uint32("algorithm"))
        .field(FieldDef::enumeration("role", &ROLES))
        .field(FieldDef::uint32("inception"))
        .field(FieldDef::uint32("is_revoked"))
        .field(FieldDef::text("key_type"))
        .field(FieldDef::text("repository"))
        .field(FieldDef::enumeration("backup", &BACKUPS))
        .build()
});

/// What a key signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyRole {
    /// Key signing key.
    Ksk = 1,
    /// Zone signing key.
    Zsk = 2,
    /// Combined signing key.
    Csk = 3,
}

impl DbEnum for KeyRole {
    fn enum_set() -> &'static EnumSet {
        &ROLES
    }

    fn code(self) -> i32 {
        self as i32
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Ksk),
            2 => Some(Self::Zsk),
            3 => Some(Self::Csk),
            _ => None,
        }
    }
}

/// Backup state of the key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyBackup {
    /// No backup is needed.
    NotRequired = 0,
    /// A backup must be made before use.
    Required = 1,
    /// A backup has been requested.
    Requested = 2,
    /// The backup exists.
    Done = 3,
}

impl DbEnum for KeyBackup {
    fn enum_set() -> &'static EnumSet {
        &BACKUPS
    }

    fn code(self) -> i32 {
        self as i32
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::NotRequired),
            1 => Some(Self::Required),
            2 => Some(Self::Requested),
            3 => Some(Self::Done),
            _ => None,
        }
    }
}

/// A key record: where the key lives, what it is for and which policy owns it.
#[derive(Debug, Clone)]
pub struct HsmKey<'c>(Instance<'c>);

impl<'c> Entity<'c> for HsmKey<'c> {
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

macro_rules! uint32_field {
    ($get:ident, $set:ident, $field:literal) => {
        #[doc = concat!("Returns `", $field, "`.")]
        ///
        /// # Errors
        ///
        /// `NotSet` if never assigned.
        pub fn $get(&self) -> CoreResult<u32> {
            self.0.get_uint32($field)
        }

        #[doc = concat!("Sets `", $field, "`.")]
        ///
        /// # Errors
        ///
        /// See [`Instance::set`].
        pub fn $set(&mut self, value: u32) -> CoreResult<()> {
            self.0.set($field, value)
        }
    };
}

macro_rules! text_field {
    ($get:ident, $set:ident, $field:literal) => {
        #[doc = concat!("Returns `", $field, "`.")]
        ///
        /// # Errors
        ///
        /// `NotSet` if never assigned.
        pub fn $get(&self) -> CoreResult<&str> {
            self.0.get_text($field)
        }

        #[doc = concat!("Sets `", $field, "`.")]
        ///
        /// # Errors
        ///
        /// See [`Instance::set`].
        pub fn $set(&mut self, value: &str) -> CoreResult<()> {
            self.0.set($field, value)
        }
    };
}

impl<'c> HsmKey<'c> {
    uint32_field!(candidate_for_sharing, set_candidate_for_sharing, "candidate_for_sharing");
    uint32_field!(bits, set_bits, "bits");
    uint32_field!(algorithm, set_algorithm, "algorithm");
    uint32_field!(inception, set_inception, "inception");
    uint32_field!(is_revoked, set_is_revoked, "is_revoked");
    text_field!(locator, set_locator, "locator");
    text_field!(policy_name, set_policy_name, "policy");
    text_field!(key_type, set_key_type, "key_type");
    text_field!(repository, set_repository, "repository");

    /// Returns the owning policy's key.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn policy_id(&self) -> CoreResult<&Value> {
        let id = self.0.get("policy_id")?;
        if id.is_unset() {
            return Err(kaspdb_value::ValueError::NotSet.into());
        }
        Ok(id)
    }

    /// Points the key at its owning policy.
    ///
    /// # Errors
    ///
    /// `FieldKindMismatch` if `id` is not a key value.
    pub fn set_policy_id(&mut self, id: impl Into<Value>) -> CoreResult<()> {
        self.0.set("policy_id", id)
    }

    /// Returns the role.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn role(&self) -> CoreResult<KeyRole> {
        self.0.get_enum("role")
    }

    /// Sets the role.
    ///
    /// # Errors
    ///
    /// See [`Instance::set`].
    pub fn set_role(&mut self, role: KeyRole) -> CoreResult<()> {
        self.0.set("role", role.to_value())
    }

    /// Returns the role as text, e.g. `"KSK"`.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn role_text(&self) -> CoreResult<&str> {
        self.0.get_enum_text("role")
    }

    /// Sets the role from text.
    ///
    /// # Errors
    ///
    /// `InvalidEnumText` if `text` is not a role; the field is left unchanged.
    pub fn set_role_text(&mut self, text: &str) -> CoreResult<()> {
        self.0.set_enum_text("role", text)
    }

    /// Returns the backup state.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn backup(&self) -> CoreResult<KeyBackup> {
        self.0.get_enum("backup")
    }

    /// Sets the backup state.
    ///
    /// # Errors
    ///
    /// See [`Instance::set`].
    pub fn set_backup(&mut self, backup: KeyBackup) -> CoreResult<()> {
        self.0.set("backup", backup.to_value())
    }

    /// Returns the backup state as text, e.g. `"Not Required"`.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn backup_text(&self) -> CoreResult<&str> {
        self.0.get_enum_text("backup")
    }

    /// Sets the backup state from text.
    ///
    /// # Errors
    ///
    /// `InvalidEnumText` if `text` is not a backup state.
    pub fn set_backup_text(&mut self, text: &str) -> CoreResult<()> {
        self.0.set_enum_text("backup", text)
    }

    /// Loads the key with the given locator.
    ///
    /// # Errors
    ///
    /// `NotFound` if no key has this locator.
    pub fn get_by_locator(&mut self, locator: &str) -> CoreResult<()> {
        let mut builder = Self::clause();
        Self::locator_clause(&mut builder, locator)?;
        self.0.get_by_clause(&builder.build())
    }

    /// Resolves the owning policy; `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Any read error.
    pub fn policy(&self) -> CoreResult<Option<Policy<'c>>> {
        self.0.resolve("policy_id")
    }

    /// Lists the keys owned by a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot start.
    pub fn list_by_policy_id(
        connection: &'c Connection,
        policy_id: &Value,
    ) -> CoreResult<EntityList<'c, Self>> {
        let mut builder = Self::clause();
        Self::policy_id_clause(&mut builder, policy_id.clone())?;
        Self::list_by_clause(connection, &builder.build())
    }

    /// Adds `policy_id = id` to `builder`.
    ///
    /// # Errors
    ///
    /// `FieldKindMismatch` if `id` is not a key value.
    pub fn policy_id_clause(
        builder: &mut ClauseBuilder,
        id: impl Into<Value>,
    ) -> CoreResult<&mut ClauseBuilder> {
        builder.add_equals("policy_id", id)
    }

    /// Adds `locator = locator` to `builder`.
    ///
    /// # Errors
    ///
    /// Only for a builder of another schema.
    pub fn locator_clause<'b>(
        builder: &'b mut ClauseBuilder,
        locator: &str,
    ) -> CoreResult<&'b mut ClauseBuilder> {
        builder.add_equals("locator", locator)
    }

    /// Adds `role = role` to `builder`.
    ///
    /// # Errors
    ///
    /// Only for a builder of another schema.
    pub fn role_clause(builder: &mut ClauseBuilder, role: KeyRole) -> CoreResult<&mut ClauseBuilder> {
        builder.add_equals("role", role.to_value())
    }

    /// Adds `backup = backup` to `builder`.
    ///
    /// # Errors
    ///
    /// Only for a builder of another schema.
    pub fn backup_clause(
        builder: &mut ClauseBuilder,
        backup: KeyBackup,
    ) -> CoreResult<&mut ClauseBuilder> {
        builder.add_equals("backup", backup.to_value())
    }

    /// Matches every key of the given policy.
    ///
    /// # Errors
    ///
    /// `FieldKindMismatch` if `id` is not a key value.
    pub fn by_policy(id: impl Into<Value>) -> CoreResult<ClauseTree> {
        let mut builder = Self::clause();
        Self::policy_id_clause(&mut builder, id)?;
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::Lifecycle;
    use crate::error::CoreError;
    use std::cmp::Ordering;

    fn connections(store: &str) -> Vec<Connection> {
        let conns = vec![
            Connection::open(&Config::sqlite_in_memory()).unwrap(),
            Connection::open(&Config::document_in_memory(store)).unwrap(),
        ];
        for conn in &conns {
            crate::model::install(conn).unwrap();
        }
        conns
    }

    fn key<'c>(conn: &'c Connection, policy: &Policy<'c>, locator: &str, role: KeyRole) -> HsmKey<'c> {
        let mut key = HsmKey::new(conn);
        key.set_policy_id(policy.key()).unwrap();
        key.set_locator(locator).unwrap();
        key.set_candidate_for_sharing(0).unwrap();
        key.set_bits(2048).unwrap();
        key.set_policy_name(policy.name().unwrap()).unwrap();
        key.set_algorithm(8).unwrap();
        key.set_role(role).unwrap();
        key.set_inception(1_700_000_000).unwrap();
        key.set_is_revoked(0).unwrap();
        key.set_key_type("RSA").unwrap();
        key.set_repository("SoftHSM").unwrap();
        key.set_backup(KeyBackup::NotRequired).unwrap();
        key
    }

    #[test]
    fn enum_text_mapping() {
        assert_eq!(KeyRole::Csk.text(), "CSK");
        assert_eq!(KeyRole::from_text("ZSK").unwrap(), KeyRole::Zsk);
        assert_eq!(KeyBackup::NotRequired.text(), "Not Required");
        assert_eq!(KeyBackup::from_code(3), Some(KeyBackup::Done));
        assert!(matches!(
            KeyBackup::from_text("Maybe"),
            Err(CoreError::InvalidEnumText { .. })
        ));
    }

    #[test]
    fn set_role_text_rejects_unknown_and_keeps_value() {
        let conn = Connection::open(&Config::sqlite_in_memory()).unwrap();
        let mut key = HsmKey::new(&conn);
        key.set_role_text("KSK").unwrap();
        assert!(matches!(
            key.set_role_text("XSK"),
            Err(CoreError::InvalidEnumText { .. })
        ));
        assert_eq!(key.role().unwrap(), KeyRole::Ksk);
        assert_eq!(key.role_text().unwrap(), "KSK");

        key.set_backup_text("Requested").unwrap();
        assert_eq!(key.backup().unwrap(), KeyBackup::Requested);
        assert!(matches!(key.bits(), Err(CoreError::Value(_))));
    }

    #[test]
    fn store_and_reload_every_field() {
        for conn in &connections("hsm-key-reload") {
            let policy = Policy::create_named(conn, "default", None).unwrap();
            let mut created = key(conn, &policy, "0123abcd", KeyRole::Ksk);
            created.create().unwrap();

            let mut loaded = HsmKey::new(conn);
            loaded.get_by_locator("0123abcd").unwrap();
            assert_eq!(loaded.lifecycle(), Lifecycle::Persisted);
            assert_eq!(loaded.compare(&created), Ordering::Equal);
            assert_eq!(loaded.role_text().unwrap(), "KSK");
            assert_eq!(loaded.backup_text().unwrap(), "Not Required");
            assert_eq!(loaded.bits().unwrap(), 2048);
            assert_eq!(loaded.repository().unwrap(), "SoftHSM");

            let owner = loaded.policy().unwrap().unwrap();
            assert_eq!(owner.name().unwrap(), "default");
        }
    }

    #[test]
    fn list_by_policy_and_role() {
        for conn in &connections("hsm-key-list") {
            let first = Policy::create_named(conn, "first", None).unwrap();
            let second = Policy::create_named(conn, "second", None).unwrap();
            key(conn, &first, "k1", KeyRole::Ksk).create().unwrap();
            key(conn, &first, "k2", KeyRole::Zsk).create().unwrap();
            key(conn, &second, "k3", KeyRole::Zsk).create().unwrap();

            let mut locators: Vec<String> = HsmKey::list_by_policy_id(conn, &first.key())
                .unwrap()
                .map(|k| k.unwrap().locator().unwrap().to_string())
                .collect();
            locators.sort();
            assert_eq!(locators, ["k1", "k2"]);

            let mut builder = HsmKey::clause();
            HsmKey::role_clause(&mut builder, KeyRole::Zsk).unwrap();
            assert_eq!(HsmKey::count(conn, &builder.build()).unwrap(), 2);
            assert_eq!(HsmKey::count(conn, &HsmKey::by_policy(second.key()).unwrap()).unwrap(), 1);
        }
    }

    #[test]
    fn duplicate_locator_and_missing_policy_are_rejected() {
        for conn in &connections("hsm-key-constraints") {
            let policy = Policy::create_named(conn, "default", None).unwrap();
            key(conn, &policy, "dup", KeyRole::Csk).create().unwrap();
            assert!(matches!(
                key(conn, &policy, "dup", KeyRole::Csk).create(),
                Err(CoreError::ConstraintViolation { .. })
            ));

            let mut orphan = key(conn, &policy, "orphan", KeyRole::Csk);
            let ghost = if conn.capabilities().integer_keys {
                Value::Int64(4242)
            } else {
                Value::from("no-such-policy")
            };
            orphan.set_policy_id(ghost).unwrap();
            assert!(matches!(
                orphan.create(),
                Err(CoreError::ConstraintViolation { .. })
            ));
        }
    }

    #[test]
    fn update_changes_backup_state() {
        for conn in &connections("hsm-key-update") {
            let policy = Policy::create_named(conn, "default", None).unwrap();
            let mut created = key(conn, &policy, "upd", KeyRole::Zsk);
            created.create().unwrap();
            created.set_backup(KeyBackup::Done).unwrap();
            created.update().unwrap();

            let mut loaded = HsmKey::new(conn);
            loaded.get_by_id(created.id()).unwrap();
            assert_eq!(loaded.backup().unwrap(), KeyBackup::Done);
            assert_eq!(loaded.revision(), created.revision());
        }
    }
}
