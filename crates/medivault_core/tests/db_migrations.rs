use medivault_core::db::migrations::{latest_version, schema_version};
use medivault_core::db::schema::{table_columns_meta, table_exists, APPLICATION_TABLES};
use medivault_core::db::{open_db, open_db_in_memory, DbError};
use medivault_core::repo::user_repo::SqliteUserRepository;
use medivault_core::RepoError;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in APPLICATION_TABLES {
        assert!(table_exists(&conn, table).unwrap(), "missing table {table}");
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("medivault.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert!(table_exists(&conn_second, "appointments").unwrap());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unopenable_path_reports_its_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("medivault.sqlite3");

    match open_db(&path).unwrap_err() {
        DbError::Open { location, .. } => assert!(location.contains("missing-dir")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at)
         VALUES ('t', 'no-such-user', 0, 1);",
        [],
    );
    assert!(err.is_err());
}

#[test]
fn role_and_status_columns_reject_unknown_values() {
    let conn = open_db_in_memory().unwrap();
    let err = conn.execute(
        "INSERT INTO users (id, email, password_hash, full_name, role)
         VALUES ('u1', 'a@b.co', 'x', 'A', 'superuser');",
        [],
    );
    assert!(err.is_err());
}

#[test]
fn column_metadata_reports_types_and_keys() {
    let conn = open_db_in_memory().unwrap();
    let columns = table_columns_meta(&conn, "users").unwrap();

    let id = columns.iter().find(|column| column.name == "id").unwrap();
    assert!(id.primary_key);
    assert_eq!(id.data_type, "TEXT");

    let email = columns.iter().find(|column| column.name == "email").unwrap();
    assert!(!email.nullable);
}

#[test]
fn repository_rejects_connection_without_schema() {
    let conn = Connection::open_in_memory().unwrap();
    match SqliteUserRepository::try_new(&conn) {
        Err(RepoError::MissingRequiredTable(table)) => assert_eq!(table, "users"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("repository must refuse an unmigrated connection"),
    }
}
