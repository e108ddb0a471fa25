//! Classification of SQLite constraint failures.

use rusqlite::ffi;

/// Which kind of schema constraint rejected a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    /// A `UNIQUE` or primary-key constraint.
    Unique,
    /// A `REFERENCES` constraint (the referenced row does not exist).
    ForeignKey,
    /// A `CHECK` or `NOT NULL` constraint.
    Check,
    /// Any other constraint failure.
    Other,
}

/// Returns the constraint kind if `err` is a constraint violation.
pub fn constraint_violation(err: &rusqlite::Error) -> Option<ConstraintViolation> {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ffi::ErrorCode::ConstraintViolation =>
        {
            Some(match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ConstraintViolation::Unique
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintViolation::ForeignKey,
                ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    ConstraintViolation::Check
                }
                _ => ConstraintViolation::Other,
            })
        }
        _ => None,
    }
}
