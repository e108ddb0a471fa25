//! Database layer for the MChannel platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and constraint-violation classification. Every
//! table is created through versioned migrations managed by this crate, and
//! every store crate talks to SQLite through a `rusqlite::Connection` handed
//! out by the pool.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: concurrent readers with a single writer,
//!   which matches many sessions polling a shared event board.
//! - **Constraints do the deciding**: uniqueness and referential integrity
//!   live in the schema. Store crates insert and classify the failure with
//!   [`constraint_violation`] instead of checking first and racing.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the code that depends on it.

mod constraint;
mod migrations;
mod pool;

pub use constraint::{constraint_violation, ConstraintViolation};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_store, DbPool, DbRuntimeSettings, PoolError};

/// SQL expression for a store-side UTC timestamp with millisecond precision.
///
/// Lexicographic order of the produced strings matches chronological order.
pub const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";
