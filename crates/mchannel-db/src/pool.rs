//! Connection pool creation and store bootstrap.

use crate::migrations::{run_migrations, MigrationError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits on a locked database before failing, in
    /// milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// A pool of SQLite connections to the shared store.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors raised while opening the store.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the pool or check out a connection.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// The settings cannot produce a usable pool.
    #[error("invalid pool settings: {0}")]
    InvalidSettings(String),

    /// The schema could not be brought up to date.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Per-connection setup: WAL journaling, enforced foreign keys and a busy
/// timeout so concurrent writers queue instead of failing immediately.
fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    let journal_mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))?;
    // In-memory databases stay in "memory" mode.
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode is {journal_mode}, expected wal")),
        ));
    }
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)
}

/// Creates a connection pool over the SQLite file at `db_path`.
///
/// `:memory:` gives every pooled connection its own private database, so
/// anything that shares state across connections needs a real file.
///
/// # Errors
///
/// Returns `PoolError::InvalidSettings` for a zero pool size and
/// `PoolError::PoolInit` if the pool cannot be built.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    if settings.pool_max_size == 0 {
        return Err(PoolError::InvalidSettings(
            "pool_max_size must be at least 1".to_string(),
        ));
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| configure_connection(conn, busy_timeout));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        pool_max_size = settings.pool_max_size,
        busy_timeout_ms = settings.busy_timeout_ms,
        "database pool created"
    );

    Ok(pool)
}

/// Opens the store: builds the pool and applies pending migrations.
///
/// Returns the pool and the number of migrations applied.
pub fn open_store(db_path: &str, settings: DbRuntimeSettings) -> Result<(DbPool, usize), PoolError> {
    let pool = create_pool(db_path, settings)?;
    let applied = {
        let conn = pool.get()?;
        run_migrations(&conn)?
    };
    if applied > 0 {
        tracing::info!(count = applied, path = db_path, "applied database migrations");
    }
    Ok((pool, applied))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_get_configured_pragmas() {
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 3,
        };

        let pool = create_pool(":memory:", settings).expect("pool creation should succeed");
        assert_eq!(pool.max_size(), 3);

        let conn = pool.get().expect("should get a connection");
        let fk: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("should query foreign_keys");
        assert!(fk, "foreign keys should be enforced");

        let busy_timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy_timeout, 2_500);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("store.db");
        let settings = DbRuntimeSettings {
            pool_max_size: 0,
            ..DbRuntimeSettings::default()
        };

        match open_store(path.to_str().expect("utf-8 path"), settings) {
            Err(PoolError::InvalidSettings(_)) => {}
            Err(other) => panic!("expected InvalidSettings, got {other:?}"),
            Ok(_) => panic!("zero-sized pool should be rejected"),
        }
        assert!(!path.exists(), "no database file should be created");
    }

    #[test]
    fn open_store_migrates_once() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("store.db");
        let path = path.to_str().expect("utf-8 path");

        let (pool, applied) =
            open_store(path, DbRuntimeSettings::default()).expect("first open should succeed");
        assert!(applied > 0);
        drop(pool);

        let (_, applied) =
            open_store(path, DbRuntimeSettings::default()).expect("reopen should succeed");
        assert_eq!(applied, 0, "schema is already current");
    }

    #[test]
    fn foreign_keys_reject_dangling_references() {
        let pool = create_pool(":memory:", DbRuntimeSettings::default()).expect("pool");
        let conn = pool.get().expect("connection");
        run_migrations(&conn).expect("migrations");

        let err = conn
            .execute(
                "INSERT INTO interests (participant_id, course_id) VALUES (1, 1)",
                [],
            )
            .expect_err("dangling interest should be rejected");
        assert_eq!(
            crate::constraint_violation(&err),
            Some(crate::ConstraintViolation::ForeignKey)
        );
    }
}
