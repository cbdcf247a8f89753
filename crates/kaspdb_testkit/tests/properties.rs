//! Behaviour every backend must share.

use kaspdb_core::backend::NativeQuery;
use kaspdb_core::{
    schema_version, ClauseBuilder, ClauseTree, Comparator, Connective, Lifecycle, VersionStatus,
};
use kaspdb_testkit::prelude::*;
use proptest::prelude::*;
use std::cmp::Ordering;

fn locators<'c>(list: impl Iterator<Item = Result<HsmKey<'c>, CoreError>>) -> Vec<String> {
    let mut out: Vec<String> = list
        .map(|key| key.unwrap().locator().unwrap().to_string())
        .collect();
    out.sort();
    out
}

#[test]
fn copy_is_field_equal_and_independent() {
    for_each_backend(|conn| {
        let mut harness = KeyHarness::new(conn, "copy").unwrap();
        let original = harness.add(&KeySpec::sample("c0ffee", KeyRole::Ksk)).unwrap();

        let mut copy = HsmKey::new(conn);
        copy.copy_from(&original).unwrap();
        assert_eq!(copy.compare(&original), Ordering::Equal);
        assert!(copy.id().is_unset());
        assert!(copy.revision().is_unset());
        assert_eq!(copy.lifecycle(), Lifecycle::Unpersisted);

        copy.set_bits(4096).unwrap();
        assert_eq!(original.bits().unwrap(), 2048);
        assert_eq!(copy.compare(&original), Ordering::Greater);
    });
}

#[test]
fn create_then_get_by_id_round_trips() {
    for_each_backend(|conn| {
        let mut harness = KeyHarness::new(conn, "round-trip").unwrap();
        for (i, role) in [KeyRole::Ksk, KeyRole::Zsk, KeyRole::Csk].into_iter().enumerate() {
            let mut spec = KeySpec::sample(&format!("rt{i}"), role);
            spec.backup = KeyBackup::Requested;
            let created = harness.add(&spec).unwrap();

            let mut loaded = HsmKey::new(conn);
            loaded.get_by_id(created.id()).unwrap();
            assert_eq!(loaded.compare(&created), Ordering::Equal);
            assert_eq!(loaded.id(), created.id());
            assert_eq!(loaded.revision(), created.revision());
        }
        harness.verify_all();
    });
}

#[test]
fn unset_nullable_fields_round_trip_as_null() {
    for_each_backend(|conn| {
        let mut created = Policy::new(conn);
        created.set_name("bare").unwrap();
        created.create().unwrap();
        assert_eq!(created.description().unwrap(), None);

        let mut loaded = Policy::new(conn);
        loaded.get_by_id(created.id()).unwrap();
        assert_eq!(loaded.compare(&created), Ordering::Equal);
    });
}

#[test]
fn second_delete_never_succeeds() {
    for_each_backend(|conn| {
        let mut harness = KeyHarness::new(conn, "delete").unwrap();
        let mut key = harness.add(&KeySpec::sample("gone", KeyRole::Zsk)).unwrap();
        let mut other = HsmKey::new(conn);
        other.get_by_id(key.id()).unwrap();

        key.delete().unwrap();
        assert!(matches!(key.delete(), Err(CoreError::AlreadyDeleted { .. })));
        assert!(matches!(other.delete(), Err(CoreError::NotFound { .. })));
        assert!(matches!(
            HsmKey::new(conn).get_by_id(key.id()),
            Err(CoreError::NotFound { .. })
        ));
    });
}

#[test]
fn stale_revision_conflicts_and_first_update_wins() {
    for_each_backend(|conn| {
        let second = conn.second_handle();
        let mut harness = KeyHarness::new(conn, "occ").unwrap();
        let created = harness.add(&KeySpec::sample("occ", KeyRole::Ksk)).unwrap();

        let mut first_view = HsmKey::new(conn);
        first_view.get_by_id(created.id()).unwrap();
        let mut second_view = HsmKey::new(&second);
        second_view.get_by_id(created.id()).unwrap();

        first_view.set_backup(KeyBackup::Done).unwrap();
        first_view.update().unwrap();

        second_view.set_backup(KeyBackup::Required).unwrap();
        let stale = second_view.update();

        let mut reread = HsmKey::new(conn);
        reread.get_by_id(created.id()).unwrap();
        if conn.tracks_revisions() {
            let err = stale.unwrap_err();
            assert!(err.is_revision_conflict(), "{err}");
            assert_eq!(reread.backup().unwrap(), KeyBackup::Done);
            assert_eq!(reread.revision(), first_view.revision());

            // re-read and retry succeeds
            second_view.get_by_id(created.id()).unwrap();
            second_view.set_backup(KeyBackup::Required).unwrap();
            second_view.update().unwrap();
        } else {
            stale.unwrap();
            assert!(reread.revision().is_unset());
            assert_eq!(reread.backup().unwrap(), KeyBackup::Required);
        }
    });
}

#[test]
fn and_clause_returns_exactly_matching_rows() {
    for_each_backend(|conn| {
        let mut harness = KeyHarness::new(conn, "clauses").unwrap();
        for (locator, bits, inception) in [
            ("a", 2048, 10),
            ("b", 2048, 20),
            ("c", 2048, 30),
            ("d", 1024, 30),
        ] {
            let mut spec = KeySpec::sample(locator, KeyRole::Zsk);
            spec.bits = bits;
            spec.inception = inception;
            harness.add(&spec).unwrap();
        }

        let mut builder = HsmKey::clause();
        builder
            .add_equals("bits", 2048u32)
            .unwrap()
            .add_comparison("inception", Comparator::GreaterThan, 15u32)
            .unwrap();
        let tree = builder.build();
        assert_eq!(locators(HsmKey::list_by_clause(conn, &tree).unwrap()), ["b", "c"]);
        assert_eq!(HsmKey::count(conn, &tree).unwrap(), 2);

        let all = ClauseTree::all(HsmKey::schema());
        assert_eq!(locators(HsmKey::list_by_clause(conn, &all).unwrap()), ["a", "b", "c", "d"]);

        let mut builder = HsmKey::clause();
        let low = builder.leaf("inception", Comparator::LessThan, 15u32).unwrap();
        let small = builder.leaf("bits", Comparator::LessOrEqual, 1024u32).unwrap();
        builder.add_connective(Connective::Or, vec![low, small]).unwrap();
        let tree = builder.build();
        assert_eq!(locators(HsmKey::list_by_clause(conn, &tree).unwrap()), ["a", "d"]);

        let mut builder = HsmKey::clause();
        let first = builder.leaf("locator", Comparator::Equal, "a").unwrap();
        builder.add_connective(Connective::Not, vec![first]).unwrap();
        assert_eq!(HsmKey::count(conn, &builder.build()).unwrap(), 3);
    });
}

#[test]
fn unknown_field_fails_at_build_time() {
    let mut builder = HsmKey::clause();
    assert!(matches!(
        builder.add_equals("no_such_field", 1u32),
        Err(CoreError::UnknownField { .. })
    ));
    assert!(matches!(
        builder.add_equals("bits", "not a number"),
        Err(CoreError::FieldKindMismatch { .. })
    ));
    assert!(matches!(
        builder.add_equals("role", "XSK"),
        Err(CoreError::InvalidEnumText { .. })
    ));
    assert!(builder.build().is_empty());
}

#[test]
fn null_handling_is_identical_across_backends() {
    for_each_backend(|conn| {
        Policy::create_named(conn, "p1", None).unwrap();
        Policy::create_named(conn, "p2", Some("lab")).unwrap();
        Policy::create_named(conn, "p3", Some("prod")).unwrap();

        let names = |tree: &ClauseTree| {
            let mut names: Vec<String> = Policy::list_by_clause(conn, tree)
                .unwrap()
                .map(|p| p.unwrap().name().unwrap().to_string())
                .collect();
            names.sort();
            names
        };

        let mut builder = Policy::clause();
        builder.add_equals("description", Value::Null).unwrap();
        assert_eq!(names(&builder.build()), ["p1"]);

        let mut builder = Policy::clause();
        builder
            .add_comparison("description", Comparator::NotEqual, "lab")
            .unwrap();
        assert_eq!(names(&builder.build()), ["p3"]);

        let mut builder = Policy::clause();
        let lab = builder.leaf("description", Comparator::Equal, "lab").unwrap();
        builder.add_connective(Connective::Not, vec![lab]).unwrap();
        assert_eq!(names(&builder.build()), ["p3"]);

        let mut builder = Policy::clause();
        builder
            .add_comparison("description", Comparator::IsNotNull, Value::Null)
            .unwrap();
        assert_eq!(names(&builder.build()), ["p2", "p3"]);
    });
}

#[test]
fn substring_match_is_relational_only() {
    for_each_backend(|conn| {
        Policy::create_named(conn, "production", None).unwrap();
        let mut builder = Policy::clause();
        builder
            .add_comparison("name", Comparator::Contains, "duct")
            .unwrap();
        let tree = builder.build();
        match conn.kind() {
            BackendKind::Sqlite => {
                assert!(matches!(
                    conn.translate(Policy::schema(), &tree).unwrap(),
                    NativeQuery::Sql { .. }
                ));
                assert_eq!(Policy::count(conn, &tree).unwrap(), 1);
            }
            BackendKind::Document | BackendKind::DocumentFile => {
                assert!(matches!(
                    conn.translate(Policy::schema(), &tree),
                    Err(CoreError::UnsupportedPredicate { .. })
                ));
                assert!(matches!(
                    Policy::list_by_clause(conn, &tree),
                    Err(CoreError::UnsupportedPredicate { .. })
                ));
            }
        }
    });
}

#[test]
fn schema_version_is_a_single_mutable_record() {
    for_each_backend(|conn| {
        assert_eq!(
            schema_version::check(conn, 1).unwrap(),
            VersionStatus::Uninitialised
        );

        schema_version::stamp(conn, 1).unwrap();
        let stored = schema_version::read(conn).unwrap().unwrap();
        assert_eq!(stored.version().unwrap(), 1);

        schema_version::stamp(conn, 2).unwrap();
        let stored = schema_version::read(conn).unwrap().unwrap();
        assert_eq!(stored.version().unwrap(), 2);
        assert_eq!(
            schema_version::check(conn, 1).unwrap(),
            VersionStatus::Newer { found: 2 }
        );

        assert_eq!(
            DatabaseVersion::count(conn, &ClauseTree::all(DatabaseVersion::schema())).unwrap(),
            1
        );
    });
}

#[test]
fn small_batches_stream_every_row() {
    for kind in BackendKind::ALL {
        let conn = TestConnection::with_batch_size(kind, 2);
        let mut harness = KeyHarness::new(&conn, "batches").unwrap();
        for i in 0..7 {
            harness.add(&KeySpec::sample(&format!("k{i}"), KeyRole::Zsk)).unwrap();
        }
        let all = locators(HsmKey::list(&conn).unwrap());
        assert_eq!(all.len(), 7);

        // abandon a cursor mid-way, then keep writing
        let mut list = HsmKey::list(&conn).unwrap();
        list.begin().unwrap().unwrap();
        drop(list);
        harness.remove("k3").unwrap();
        harness.verify_all();
        assert_eq!(harness.len(), 6);
    }
}

#[test]
fn referenced_policy_cannot_be_deleted() {
    for_each_backend(|conn| {
        let mut harness = KeyHarness::new(conn, "owner").unwrap();
        harness.add(&KeySpec::sample("child", KeyRole::Csk)).unwrap();
        let mut policy = harness.policy().clone();
        assert!(matches!(
            policy.delete(),
            Err(CoreError::ConstraintViolation { .. })
        ));
        harness.remove("child").unwrap();
        policy.delete().unwrap();
    });
}

#[test]
fn connections_to_one_store_work_from_several_threads() {
    let conn = TestConnection::new(BackendKind::Document);
    let policy_id = Policy::create_named(&conn, "shared", None).unwrap().key();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let config = conn.config().clone();
            let policy_id = policy_id.clone();
            scope.spawn(move || {
                let own = Connection::open(&config).unwrap();
                for i in 0..5 {
                    let mut key = HsmKey::new(&own);
                    KeySpec::sample(&format!("w{worker}-{i}"), KeyRole::Zsk)
                        .apply(&mut key, policy_id.clone(), "shared")
                        .unwrap();
                    key.create().unwrap();
                }
            });
        }
    });

    assert_eq!(HsmKey::list_by_policy_id(&conn, &policy_id).unwrap().count(), 20);
}

#[test]
fn document_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = kaspdb_core::Config::document_file(dir.path().join("kasp.cbor"));
    {
        let conn = Connection::open(&config).unwrap();
        kaspdb_core::model::install(&conn).unwrap();
        Policy::create_named(&conn, "persisted", Some("on disk")).unwrap();
        schema_version::stamp(&conn, 1).unwrap();
    }
    let conn = Connection::open(&config).unwrap();
    let mut policy = Policy::new(&conn);
    policy.get_by_name("persisted").unwrap();
    assert_eq!(policy.description().unwrap(), Some("on disk"));
    assert_eq!(
        schema_version::check(&conn, 1).unwrap(),
        VersionStatus::Current
    );
}

#[test]
fn referenced_policy_stays_protected_after_reopen() {
    for kind in [BackendKind::Sqlite, BackendKind::DocumentFile] {
        let dir = tempfile::tempdir().unwrap();
        let config = match kind {
            BackendKind::Sqlite => kaspdb_core::Config::sqlite(dir.path().join("kasp.db")),
            _ => kaspdb_core::Config::document_file(dir.path().join("kasp.cbor")),
        };
        {
            let conn = Connection::open(&config).unwrap();
            kaspdb_core::model::install(&conn).unwrap();
            let mut harness = KeyHarness::new(&conn, "restrict").unwrap();
            harness.add(&KeySpec::sample("held", KeyRole::Ksk)).unwrap();
        }

        let conn = Connection::open(&config).unwrap();
        let mut policy = Policy::new(&conn);
        policy.get_by_name("restrict").unwrap();
        assert!(
            matches!(policy.delete(), Err(CoreError::ConstraintViolation { .. })),
            "{kind:?}"
        );
    }
}

mod hydration {
    use super::*;

    /// Writes a key whose role code names no member, behind the engine's back.
    fn inject_bad_row(conn: &TestConnection, policy_id: &Value) {
        let path = conn.path().unwrap();
        let raw = rusqlite::Connection::open(path).unwrap();
        raw.execute(
            "INSERT INTO \"hsm_key\" (\"policy_id\", \"locator\", \"candidate_for_sharing\", \
             \"bits\", \"policy\", \"algorithm\", \"role\", \"inception\", \"is_revoked\", \
             \"key_type\", \"repository\", \"backup\") \
             VALUES (?1, 'bad', 0, 2048, 'default', 8, 9, 0, 0, 'RSA', 'SoftHSM', 0)",
            [policy_id.to_i64().unwrap()],
        )
        .unwrap();
    }

    fn populated() -> TestConnection {
        let conn = TestConnection::with_batch_size(BackendKind::Sqlite, 2);
        {
            let mut harness = KeyHarness::new(&conn, "default").unwrap();
            harness.add(&KeySpec::sample("good1", KeyRole::Ksk)).unwrap();
            inject_bad_row(&conn, &harness.policy().key());
            harness.add(&KeySpec::sample("good2", KeyRole::Zsk)).unwrap();
        }
        conn
    }

    #[test]
    fn bad_row_fails_alone() {
        let conn = populated();
        let results: Vec<_> = HsmKey::list(&conn).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CoreError::Hydration { ref field, .. }) if field == "role"
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn strict_iteration_stops_at_first_error() {
        let conn = populated();
        let results: Vec<_> = HsmKey::list(&conn).unwrap().strict().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn get_by_locator_reports_hydration_error() {
        let conn = populated();
        assert!(matches!(
            HsmKey::new(&conn).get_by_locator("bad"),
            Err(CoreError::Hydration { .. })
        ));
    }
}

proptest! {
    #![proptest_config(PropTestConfig { cases: 8 }.to_proptest_config())]

    #[test]
    fn stored_keys_match_what_was_written(specs in key_specs_strategy(6)) {
        for kind in [BackendKind::Sqlite, BackendKind::Document] {
            let conn = TestConnection::new(kind);
            let mut harness = KeyHarness::new(&conn, "generated").unwrap();
            for spec in &specs {
                harness.add(spec).unwrap();
            }
            harness.verify_all();
            prop_assert_eq!(
                HsmKey::count(&conn, &ClauseTree::all(HsmKey::schema())).unwrap(),
                specs.len() as u64
            );
        }
    }

    #[test]
    fn role_filter_matches_generated_roles(specs in key_specs_strategy(6), role in key_role_strategy()) {
        let expected = specs.iter().filter(|s| s.role == role).count() as u64;
        for kind in [BackendKind::Sqlite, BackendKind::Document] {
            let conn = TestConnection::new(kind);
            let mut harness = KeyHarness::new(&conn, "roles").unwrap();
            for spec in &specs {
                harness.add(spec).unwrap();
            }
            let mut builder = ClauseBuilder::new(HsmKey::schema());
            HsmKey::role_clause(&mut builder, role).unwrap();
            prop_assert_eq!(HsmKey::count(&conn, &builder.build()).unwrap(), expected);
        }
    }
}
