//! Board schema migrations.
//!
//! # Responsibility
//! - Keep the ordered list of schema steps for the board graph and templates.
//! - Bring a connection from its recorded version up to `latest_version`.
//!
//! # Invariants
//! - Steps run in one transaction; a failed step leaves the previous version.
//! - `PRAGMA user_version` always names the last step that was applied.
//! - A database recorded at a newer version than this binary knows is never
//!   touched.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "boards",
        sql: include_str!("0001_boards.sql"),
    },
    SchemaStep {
        version: 2,
        name: "templates",
        sql: include_str!("0002_templates.sql"),
    },
];

pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Version recorded in `PRAGMA user_version`; `0` for a fresh database.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
}

/// Upgrades the connection's schema to `latest_version`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is ahead of this binary.
/// - `Migration` naming the step whose SQL failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let target = latest_version();
    if from_version > target {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: target,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            })?;
        debug!(
            "event=db_migrate_step module=db version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        from_version, target
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, schema_version, SCHEMA_STEPS};
    use rusqlite::Connection;

    #[test]
    fn steps_are_strictly_increasing_from_one() {
        let versions: Vec<u32> = SCHEMA_STEPS.iter().map(|step| step.version).collect();
        let expected: Vec<u32> = (1..=SCHEMA_STEPS.len() as u32).collect();
        assert_eq!(versions, expected);
    }

    #[test]
    fn partial_schema_is_upgraded_from_recorded_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_STEPS[0].sql).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        apply_migrations(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), super::latest_version());
        let templates: i64 = conn
            .query_row("SELECT COUNT(*) FROM board_templates;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(templates, 0);
    }
}
