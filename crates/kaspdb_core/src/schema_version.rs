//! Schema version detection.
//!
//! The stored data carries a single [`DatabaseVersion`] record. At startup
//! the process compares it with [`CURRENT_VERSION`] and refuses to run
//! against a schema it does not understand.
//!
//! ```rust,ignore
//! match schema_version::check(&conn, CURRENT_VERSION)? {
//!     VersionStatus::Current => {}
//!     VersionStatus::Uninitialised => schema_version::stamp(&conn, CURRENT_VERSION)?,
//!     other => return Err(format!("unusable store: {other}").into()),
//! }
//! ```

use crate::connection::Connection;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::model::DatabaseVersion;
use std::cmp::Ordering;
use std::fmt;
use tracing::info;

/// Schema version this build reads and writes.
pub const CURRENT_VERSION: u32 = 1;

/// Result of comparing the stored version with the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// No version record exists.
    Uninitialised,
    /// The stored version is the expected one.
    Current,
    /// The store predates this build.
    Outdated {
        /// Stored version.
        found: u32,
    },
    /// The store was written by a newer build.
    Newer {
        /// Stored version.
        found: u32,
    },
}

impl VersionStatus {
    /// Returns true only for [`VersionStatus::Current`].
    #[must_use]
    pub fn is_current(self) -> bool {
        self == Self::Current
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialised => write!(f, "uninitialised"),
            Self::Current => write!(f, "current"),
            Self::Outdated { found } => write!(f, "outdated (found version {found})"),
            Self::Newer { found } => write!(f, "newer (found version {found})"),
        }
    }
}

/// Reads the version record, `None` if the store has none.
///
/// # Errors
///
/// [`CoreError::Corrupted`] if more than one record exists, or any read error.
pub fn read(connection: &Connection) -> CoreResult<Option<DatabaseVersion<'_>>> {
    let mut records = DatabaseVersion::list(connection)?.strict();
    let Some(first) = records.begin()? else {
        return Ok(None);
    };
    if records.get_next()?.is_some() {
        return Err(CoreError::corrupted(
            "more than one database_version record",
        ));
    }
    Ok(Some(first))
}

/// Compares the stored version with `expected`. A store without version
/// storage is [`VersionStatus::Uninitialised`]; nothing is created.
///
/// # Errors
///
/// Same as [`read`].
pub fn check(connection: &Connection, expected: u32) -> CoreResult<VersionStatus> {
    if !connection.is_installed(DatabaseVersion::schema())? {
        return Ok(VersionStatus::Uninitialised);
    }
    let Some(record) = read(connection)? else {
        return Ok(VersionStatus::Uninitialised);
    };
    let found = record.version()?;
    Ok(match found.cmp(&expected) {
        Ordering::Equal => VersionStatus::Current,
        Ordering::Less => VersionStatus::Outdated { found },
        Ordering::Greater => VersionStatus::Newer { found },
    })
}

/// Records `version` as the stored version, updating the existing record if
/// there is one.
///
/// # Errors
///
/// Same as [`read`], plus any write error.
pub fn stamp(connection: &Connection, version: u32) -> CoreResult<()> {
    match read(connection)? {
        Some(mut record) => {
            let previous = record.version()?;
            if previous != version {
                record.set_version(version)?;
                record.update()?;
                info!(from = previous, to = version, "database version updated");
            }
        }
        None => {
            let mut record = DatabaseVersion::new(connection);
            record.set_version(version)?;
            record.create()?;
            info!(version, "database version recorded");
        }
    }
    Ok(())
}
