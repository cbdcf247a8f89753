//! Cross-backend integration test helpers.
//!
//! [`KeyHarness`] writes keys through the entity API and remembers what it
//! wrote, so tests can check what a backend returns against what was stored.

use crate::generators::KeySpec;
use kaspdb_core::model::{HsmKey, Policy};
use kaspdb_core::{Connection, CoreResult, Entity};
use std::collections::BTreeMap;

/// A test harness that tracks stored keys for later verification.
pub struct KeyHarness<'c> {
    conn: &'c Connection,
    policy: Policy<'c>,
    keys: BTreeMap<String, KeySpec>,
}

impl<'c> KeyHarness<'c> {
    /// Creates the harness and its owning policy.
    pub fn new(conn: &'c Connection, policy_name: &str) -> CoreResult<Self> {
        let policy = Policy::create_named(conn, policy_name, None)?;
        Ok(Self {
            conn,
            policy,
            keys: BTreeMap::new(),
        })
    }

    /// Returns the owning policy.
    pub fn policy(&self) -> &Policy<'c> {
        &self.policy
    }

    /// Stores a key and tracks it.
    pub fn add(&mut self, spec: &KeySpec) -> CoreResult<HsmKey<'c>> {
        let mut key = HsmKey::new(self.conn);
        spec.apply(&mut key, self.policy.key(), self.policy.name()?)?;
        key.create()?;
        self.keys.insert(spec.locator.clone(), spec.clone());
        Ok(key)
    }

    /// Deletes a tracked key by locator.
    pub fn remove(&mut self, locator: &str) -> CoreResult<()> {
        let mut key = HsmKey::new(self.conn);
        key.get_by_locator(locator)?;
        key.delete()?;
        self.keys.remove(locator);
        Ok(())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Lists the policy's keys and checks them against the tracked specs.
    ///
    /// Panics on any difference.
    pub fn verify_all(&self) {
        let mut seen = BTreeMap::new();
        for key in HsmKey::list_by_policy_id(self.conn, &self.policy.key())
            .expect("Failed to list keys")
            .strict()
        {
            let key = key.expect("Failed to hydrate key");
            let locator = key.locator().expect("locator").to_string();
            seen.insert(locator, key);
        }
        assert_eq!(
            seen.keys().collect::<Vec<_>>(),
            self.keys.keys().collect::<Vec<_>>(),
            "stored locators differ from tracked locators"
        );

        for (locator, spec) in &self.keys {
            let key = &seen[locator];
            let mut expected = HsmKey::new(self.conn);
            spec.apply(&mut expected, self.policy.key(), self.policy.name().expect("name"))
                .expect("Failed to apply spec");
            assert_eq!(
                key.compare(&expected),
                std::cmp::Ordering::Equal,
                "key {locator} differs from its spec"
            );
        }
    }
}
