//! Setup command implementation.

use kaspdb_core::{model, schema_version, Connection, VersionStatus, CURRENT_VERSION};

/// Runs the setup command.
///
/// Creates missing storage and stamps the current schema version. A store
/// written by a newer build is left untouched.
pub fn run(conn: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    model::install(conn)?;

    match schema_version::check(conn, CURRENT_VERSION)? {
        VersionStatus::Newer { found } => {
            return Err(format!(
                "store has schema version {found}, this build supports {CURRENT_VERSION}"
            )
            .into());
        }
        VersionStatus::Current => println!("Schema version {CURRENT_VERSION} already recorded"),
        status => {
            schema_version::stamp(conn, CURRENT_VERSION)?;
            println!("Schema was {status}, now at version {CURRENT_VERSION}");
        }
    }
    println!("✓ Setup complete ({} backend)", conn.backend_name());
    Ok(())
}
