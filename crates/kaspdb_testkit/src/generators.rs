//! Property-based test generators using proptest.
//!
//! Provides strategies for values and for key records that satisfy the
//! built-in schemas.

use kaspdb_core::model::{HsmKey, KeyBackup, KeyRole};
use kaspdb_core::{CoreResult, Value};
use kaspdb_value::EnumValue;
use proptest::prelude::*;

/// Strategy for any value, including unset and null.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Unset),
        Just(Value::Null),
        any::<i32>().prop_map(Value::Int32),
        any::<u32>().prop_map(Value::UInt32),
        any::<i64>().prop_map(Value::Int64),
        any::<u64>().prop_map(Value::UInt64),
        ".{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Binary),
        (0..4i32, "[A-Z]{1,4}").prop_map(|(code, text)| Value::Enum(EnumValue::new(code, text))),
    ]
}

/// Strategy for HSM locators.
pub fn locator_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-f]{8,32}").expect("Invalid regex")
}

/// Strategy for policy names.
pub fn policy_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_-]{0,15}").expect("Invalid regex")
}

/// Strategy for key roles.
pub fn key_role_strategy() -> impl Strategy<Value = KeyRole> {
    prop_oneof![Just(KeyRole::Ksk), Just(KeyRole::Zsk), Just(KeyRole::Csk)]
}

/// Strategy for key backup states.
pub fn key_backup_strategy() -> impl Strategy<Value = KeyBackup> {
    prop_oneof![
        Just(KeyBackup::NotRequired),
        Just(KeyBackup::Required),
        Just(KeyBackup::Requested),
        Just(KeyBackup::Done),
    ]
}

/// Field values for one `hsm_key` record, minus the owning policy.
#[derive(Debug, Clone)]
pub struct KeySpec {
    /// HSM locator.
    pub locator: String,
    /// Key size in bits.
    pub bits: u32,
    /// DNSSEC algorithm number.
    pub algorithm: u32,
    /// Key role.
    pub role: KeyRole,
    /// Inception time.
    pub inception: u32,
    /// Revocation flag.
    pub is_revoked: bool,
    /// Sharing flag.
    pub candidate_for_sharing: bool,
    /// Backup state.
    pub backup: KeyBackup,
    /// Repository name.
    pub repository: String,
}

impl KeySpec {
    /// A fixed spec for example based tests.
    pub fn sample(locator: &str, role: KeyRole) -> Self {
        Self {
            locator: locator.to_string(),
            bits: 2048,
            algorithm: 8,
            role,
            inception: 1_700_000_000,
            is_revoked: false,
            candidate_for_sharing: false,
            backup: KeyBackup::NotRequired,
            repository: "SoftHSM".to_string(),
        }
    }

    /// Writes these field values into `key`, linking it to `policy_id` / `policy_name`.
    pub fn apply(&self, key: &mut HsmKey<'_>, policy_id: Value, policy_name: &str) -> CoreResult<()> {
        key.set_policy_id(policy_id)?;
        key.set_locator(&self.locator)?;
        key.set_candidate_for_sharing(u32::from(self.candidate_for_sharing))?;
        key.set_bits(self.bits)?;
        key.set_policy_name(policy_name)?;
        key.set_algorithm(self.algorithm)?;
        key.set_role(self.role)?;
        key.set_inception(self.inception)?;
        key.set_is_revoked(u32::from(self.is_revoked))?;
        key.set_key_type("RSA")?;
        key.set_repository(&self.repository)?;
        key.set_backup(self.backup)
    }
}

/// Strategy for key specs.
pub fn key_spec_strategy() -> impl Strategy<Value = KeySpec> {
    (
        locator_strategy(),
        prop_oneof![Just(1024u32), Just(2048), Just(4096)],
        prop_oneof![Just(8u32), Just(13), Just(15)],
        key_role_strategy(),
        any::<u32>(),
        any::<bool>(),
        any::<bool>(),
        key_backup_strategy(),
        "[A-Za-z]{1,12}",
    )
        .prop_map(
            |(
                locator,
                bits,
                algorithm,
                role,
                inception,
                is_revoked,
                candidate_for_sharing,
                backup,
                repository,
            )| KeySpec {
                locator,
                bits,
                algorithm,
                role,
                inception,
                is_revoked,
                candidate_for_sharing,
                backup,
                repository,
            },
        )
}

/// Strategy for a set of key specs with distinct locators.
pub fn key_specs_strategy(max: usize) -> impl Strategy<Value = Vec<KeySpec>> {
    prop::collection::vec(key_spec_strategy(), 0..=max).prop_map(|mut specs| {
        let mut seen = std::collections::HashSet::new();
        specs.retain(|spec| seen.insert(spec.locator.clone()));
        specs
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases.
    pub cases: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self { cases: 32 }
    }
}

impl PropTestConfig {
    /// Converts to a proptest config.
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            ..ProptestConfig::default()
        }
    }
}
