//! Connection bootstrap: PRAGMAs, then migrations.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections are at [`latest_version`](super::migrations::latest_version).

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MEMORY_LOCATION: &str = ":memory:";

/// Opens (creating if needed) the database file at `path` and migrates it.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_at(path.display().to_string(), || Connection::open(path))
}

/// Opens a private in-memory database; used by tests and tooling.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_at(MEMORY_LOCATION.to_string(), Connection::open_in_memory)
}

fn open_at(
    location: String,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = connect()
        .map_err(|source| DbError::Open {
            location: location.clone(),
            source,
        })
        .and_then(|mut conn| {
            let applied = prepare(&mut conn)?;
            Ok((conn, applied))
        });

    match result {
        Ok((conn, applied)) => {
            info!(
                "event=db_open module=db status=ok location={} migrations_applied={} duration_ms={}",
                location,
                applied,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error location={} duration_ms={} error={}",
                location,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> DbResult<usize> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
