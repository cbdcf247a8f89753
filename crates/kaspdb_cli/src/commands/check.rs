//! Check command implementation.

use kaspdb_core::{schema_version, Connection, VersionStatus, CURRENT_VERSION};

/// Runs the check command. Fails unless the stored version is current.
pub fn run(conn: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    let status = status(conn)?;
    println!("Schema version: {status}");
    if status.is_current() {
        println!("✓ Store matches this build");
        Ok(())
    } else {
        println!("✗ Store does not match schema version {CURRENT_VERSION}");
        Err("Schema version check failed".into())
    }
}

fn status(conn: &Connection) -> Result<VersionStatus, Box<dyn std::error::Error>> {
    Ok(schema_version::check(conn, CURRENT_VERSION)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaspdb_core::Config;

    #[test]
    fn fails_until_setup() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::sqlite(dir.path().join("kasp.db"));
        let conn = Connection::open(&config).unwrap();
        assert!(run(&conn).is_err());

        crate::commands::setup::run(&conn).unwrap();
        run(&conn).unwrap();
    }

    #[test]
    fn empty_store_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kasp.cbor");
        let conn = Connection::open(&Config::document_file(path.clone())).unwrap();
        assert_eq!(status(&conn).unwrap(), VersionStatus::Uninitialised);
        assert!(run(&conn).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn outdated_store_fails() {
        let conn = Connection::open(&Config::document_in_memory("cli-check-outdated")).unwrap();
        kaspdb_core::model::install(&conn).unwrap();
        schema_version::stamp(&conn, 0).unwrap();
        assert_eq!(status(&conn).unwrap(), VersionStatus::Outdated { found: 0 });
        assert!(run(&conn).is_err());
    }
}
