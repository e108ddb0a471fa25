//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run sequentially
//! on startup, tracked by the `_mchannel_migrations` table. The applied set
//! is read once up front; each pending migration then runs in its own
//! transaction together with its tracking row.

use rusqlite::Connection;
use std::collections::HashSet;
use thiserror::Error;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_participants",
        sql: include_str!("migrations/001_participants.sql"),
    },
    Migration {
        name: "002_courses",
        sql: include_str!("migrations/002_courses.sql"),
    },
    Migration {
        name: "003_interests",
        sql: include_str!("migrations/003_interests.sql"),
    },
    Migration {
        name: "004_events",
        sql: include_str!("migrations/004_events.sql"),
    },
    Migration {
        name: "005_messages",
        sql: include_str!("migrations/005_messages.sql"),
    },
    Migration {
        name: "006_event_attendance",
        sql: include_str!("migrations/006_event_attendance.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations against the given connection.
///
/// Returns the number of migrations applied by this call.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// migration tracking table cannot be queried.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _mchannel_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_mchannel_migrations_bootstrap".to_string(),
        source: e,
    })?;

    let done = applied_migrations(conn)?;
    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| !done.contains(m.name))
        .collect();
    tracing::debug!(
        applied = done.len(),
        pending = pending.len(),
        "checked schema version"
    );

    for migration in &pending {
        tracing::info!(migration = migration.name, "applying migration");

        let failed = |e: rusqlite::Error| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source: e,
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _mchannel_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;
    }

    Ok(pending.len())
}

/// Names of the migrations already recorded in the tracking table.
fn applied_migrations(conn: &Connection) -> Result<HashSet<String>, MigrationError> {
    let mut stmt = conn
        .prepare("SELECT name FROM _mchannel_migrations")
        .map_err(MigrationError::StateQuery)?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(MigrationError::StateQuery)?
        .collect::<Result<HashSet<String>, _>>()
        .map_err(MigrationError::StateQuery)?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .expect("should prepare sqlite_master query");
        stmt.query_map([], |row| row.get(0))
            .expect("should list tables")
            .collect::<Result<_, _>>()
            .expect("should read table names")
    }

    #[test]
    fn fresh_store_gets_every_table() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        assert_eq!(run_migrations(&conn).expect("migrate"), MIGRATIONS.len());

        let tables = table_names(&conn);
        for table in [
            "participants",
            "courses",
            "interests",
            "events",
            "messages",
            "event_attendance",
        ] {
            assert!(tables.iter().any(|t| t == table), "{table} missing: {tables:?}");
        }
        assert_eq!(
            applied_migrations(&conn).expect("tracking rows").len(),
            MIGRATIONS.len()
        );
    }

    #[test]
    fn rerun_applies_nothing() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        run_migrations(&conn).expect("first run");
        assert_eq!(run_migrations(&conn).expect("second run"), 0);
    }

    #[test]
    fn only_new_migrations_run_on_an_existing_store() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        run_migrations_from_list(&conn, &MIGRATIONS[..2]).expect("partial schema");
        assert!(!table_names(&conn).iter().any(|t| t == "events"));

        let applied = run_migrations(&conn).expect("catch up");
        assert_eq!(applied, MIGRATIONS.len() - 2);
        assert!(table_names(&conn).iter().any(|t| t == "events"));
    }

    #[test]
    fn failing_migration_leaves_no_partial_schema() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let broken = [Migration {
            name: "900_broken_board",
            sql: "
                CREATE TABLE board_probe (id INTEGER PRIMARY KEY);
                INSERT INTO no_such_table (id) VALUES (1);
            ",
        }];

        match run_migrations_from_list(&conn, &broken) {
            Err(MigrationError::ExecutionFailed { name, .. }) => {
                assert_eq!(name, "900_broken_board")
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }

        assert!(!table_names(&conn).iter().any(|t| t == "board_probe"));
        assert!(applied_migrations(&conn).expect("tracking rows").is_empty());
    }
}
