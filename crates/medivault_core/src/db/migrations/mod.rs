//! Ordered schema migrations tracked in `PRAGMA user_version`.
//!
//! # Invariants
//! - Versions start at 1 and increase by exactly one.
//! - An upgrade runs in one transaction: either every pending step lands
//!   or the database keeps its previous version.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users_sessions",
        sql: include_str!("0001_users_sessions.sql"),
    },
    Migration {
        version: 2,
        name: "appointments",
        sql: include_str!("0002_appointments.sql"),
    },
    Migration {
        version: 3,
        name: "prescriptions_lab_tests",
        sql: include_str!("0003_prescriptions_lab_tests.sql"),
    },
    Migration {
        version: 4,
        name: "notifications",
        sql: include_str!("0004_notifications.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Version currently recorded in the database file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings `conn` up to [`latest_version`]; returns the number of steps run.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    run_pending(conn, MIGRATIONS)
}

fn run_pending(conn: &mut Connection, steps: &[Migration]) -> DbResult<usize> {
    let from = schema_version(conn)?;
    let target = steps.last().map_or(0, |migration| migration.version);
    if from > target {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: target,
        });
    }

    let pending: Vec<&Migration> = steps.iter().filter(|step| step.version > from).collect();
    if pending.is_empty() {
        debug!("event=db_migrate module=db status=ok version={from} applied=0");
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            })?;
        info!(
            "event=db_migration_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} applied={}",
        from,
        target,
        pending.len()
    );
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::{run_pending, schema_version, Migration, MIGRATIONS};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1, "{}", migration.name);
        }
    }

    #[test]
    fn failing_step_rolls_back_and_names_the_migration() {
        let mut conn = Connection::open_in_memory().unwrap();
        let steps = [
            Migration {
                version: 1,
                name: "wards",
                sql: "CREATE TABLE wards (id TEXT PRIMARY KEY);",
            },
            Migration {
                version: 2,
                name: "beds",
                sql: "CREATE TABLE beds (ward_id TEXT REFERENCES wards(id)) nonsense;",
            },
        ];

        match run_pending(&mut conn, &steps).unwrap_err() {
            DbError::Migration { version, name, .. } => {
                assert_eq!(version, 2);
                assert_eq!(name, "beds");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(schema_version(&conn).unwrap(), 0);
        let wards: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'wards';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(wards, 0);
    }

    #[test]
    fn partially_migrated_database_only_runs_newer_steps() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE wards (id TEXT); PRAGMA user_version = 1;")
            .unwrap();
        let steps = [
            Migration {
                version: 1,
                name: "wards",
                sql: "CREATE TABLE wards (id TEXT);",
            },
            Migration {
                version: 2,
                name: "beds",
                sql: "CREATE TABLE beds (id TEXT);",
            },
        ];

        assert_eq!(run_pending(&mut conn, &steps).unwrap(), 1);
        assert_eq!(schema_version(&conn).unwrap(), 2);
        assert_eq!(run_pending(&mut conn, &steps).unwrap(), 0);
    }
}
