//! Keys command implementation.

use kaspdb_core::model::{HsmKey, Policy};
use kaspdb_core::{Connection, Entity};
use tracing::warn;

/// Runs the keys command.
pub fn run(conn: &Connection, policy: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let rows = list(conn, policy)?;
    if rows.is_empty() {
        println!("No keys");
        return Ok(());
    }
    println!(
        "{:<32} {:<12} {:<5} {:>5} {:>4} {:<12}",
        "Locator", "Policy", "Role", "Bits", "Alg", "Backup"
    );
    for row in &rows {
        println!(
            "{:<32} {:<12} {:<5} {:>5} {:>4} {:<12}",
            row.locator, row.policy, row.role, row.bits, row.algorithm, row.backup
        );
    }
    Ok(())
}

/// One printed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    /// HSM locator.
    pub locator: String,
    /// Owning policy name.
    pub policy: String,
    /// Role text.
    pub role: String,
    /// Key size.
    pub bits: u32,
    /// Algorithm number.
    pub algorithm: u32,
    /// Backup state text.
    pub backup: String,
}

fn list(conn: &Connection, policy: Option<&str>) -> Result<Vec<KeyRow>, Box<dyn std::error::Error>> {
    let keys = match policy {
        Some(name) => {
            let mut owner = Policy::new(conn);
            owner.get_by_name(name)?;
            HsmKey::list_by_policy_id(conn, owner.id())?
        }
        None => HsmKey::list(conn)?,
    };

    let mut rows = Vec::new();
    for key in keys {
        let key = match key {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "skipping unreadable key");
                continue;
            }
        };
        rows.push(KeyRow {
            locator: key.locator()?.to_string(),
            policy: key.policy_name()?.to_string(),
            role: key.role_text()?.to_string(),
            bits: key.bits()?,
            algorithm: key.algorithm()?,
            backup: key.backup_text()?.to_string(),
        });
    }
    rows.sort_by(|a, b| a.locator.cmp(&b.locator));
    Ok(rows)
}
