//! Participant identity for the MChannel platform.
//!
//! A participant is identified by a contact key (a fixed-length numeric
//! phone number). Registration is idempotent for the same name and contact,
//! and a contact can never be re-bound to a different name.

mod contact;

pub use contact::ContactRule;

use mchannel_types::ErrorKind;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("display name must not be empty")]
    EmptyName,
    #[error("contact must be exactly {expected_digits} digits")]
    InvalidContact { expected_digits: usize },
    #[error("contact {0} is already registered under a different name")]
    NameMismatch(String),
    #[error("participant not found: {0}")]
    NotFound(String),
}

impl IdentityError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) => ErrorKind::Storage,
            Self::EmptyName | Self::InvalidContact { .. } => ErrorKind::Validation,
            Self::NameMismatch(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// A registered participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Internal database ID.
    pub id: i64,
    /// Display name, exactly as registered.
    pub name: String,
    /// Unique contact key.
    pub contact: String,
    /// Registration timestamp (ISO 8601, UTC).
    pub created_at: String,
}

/// Registers a participant, or returns the existing record for a repeat
/// registration with the same name.
///
/// The insert and the uniqueness check are a single statement
/// (`ON CONFLICT DO NOTHING`), so two concurrent registrations of the same
/// contact never both insert.
///
/// # Errors
///
/// - `EmptyName` if `name` is blank after trimming.
/// - `InvalidContact` if `contact` does not satisfy `rule`.
/// - `NameMismatch` if `contact` is already registered under another name.
pub fn register(
    conn: &Connection,
    rule: &ContactRule,
    name: &str,
    contact: &str,
) -> Result<Participant, IdentityError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IdentityError::EmptyName);
    }
    let contact = rule.normalize(contact)?;

    let inserted = conn
        .query_row(
            "INSERT INTO participants (name, contact) VALUES (?1, ?2)
             ON CONFLICT(contact) DO NOTHING
             RETURNING id, name, contact, created_at",
            params![name, contact],
            map_row_to_participant,
        )
        .optional()?;

    if let Some(participant) = inserted {
        tracing::info!(participant_id = participant.id, "participant registered");
        return Ok(participant);
    }

    let existing = lookup(conn, &contact)?;
    if existing.name != name {
        return Err(IdentityError::NameMismatch(contact));
    }
    tracing::debug!(participant_id = existing.id, "participant re-registered");
    Ok(existing)
}

/// Looks up a participant by contact key.
pub fn lookup(conn: &Connection, contact: &str) -> Result<Participant, IdentityError> {
    let contact = contact.trim();
    conn.query_row(
        "SELECT id, name, contact, created_at FROM participants WHERE contact = ?1",
        [contact],
        map_row_to_participant,
    )
    .optional()?
    .ok_or_else(|| IdentityError::NotFound(contact.to_string()))
}

/// Retrieves a participant by internal ID.
pub fn get_participant(conn: &Connection, id: i64) -> Result<Participant, IdentityError> {
    conn.query_row(
        "SELECT id, name, contact, created_at FROM participants WHERE id = ?1",
        [id],
        map_row_to_participant,
    )
    .optional()?
    .ok_or_else(|| IdentityError::NotFound(id.to_string()))
}

fn map_row_to_participant(row: &Row) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        name: row.get(1)?,
        contact: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mchannel_db::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("failed to enable foreign keys");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let conn = setup_db();
        let rule = ContactRule::default();

        let registered =
            register(&conn, &rule, "Asha", "9876543210").expect("register failed");
        let found = lookup(&conn, "9876543210").expect("lookup failed");

        assert_eq!(found, registered);
        assert_eq!(found.name, "Asha");
        assert_eq!(found.contact, "9876543210");
    }

    #[test]
    fn repeat_registration_with_same_name_returns_same_participant() {
        let conn = setup_db();
        let rule = ContactRule::default();

        let first = register(&conn, &rule, "Asha", "9876543210").expect("first failed");
        let second = register(&conn, &rule, "Asha", "9876543210").expect("second failed");
        assert_eq!(first.id, second.id);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn repeat_registration_with_different_name_is_rejected() {
        let conn = setup_db();
        let rule = ContactRule::default();

        register(&conn, &rule, "Asha", "9876543210").expect("register failed");
        let err = register(&conn, &rule, "Ravi", "9876543210").unwrap_err();
        match err {
            IdentityError::NameMismatch(ref contact) => assert_eq!(contact, "9876543210"),
            ref other => panic!("expected NameMismatch, got {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // The stored name is untouched.
        assert_eq!(lookup(&conn, "9876543210").unwrap().name, "Asha");
    }

    #[test]
    fn name_comparison_is_exact() {
        let conn = setup_db();
        let rule = ContactRule::default();

        register(&conn, &rule, "Asha", "9876543210").unwrap();
        let err = register(&conn, &rule, "asha", "9876543210").unwrap_err();
        assert!(matches!(err, IdentityError::NameMismatch(_)));

        // Surrounding whitespace is not part of the name.
        register(&conn, &rule, "  Asha ", "9876543210").expect("trimmed name should match");
    }

    #[test]
    fn invalid_input_writes_nothing() {
        let conn = setup_db();
        let rule = ContactRule::default();

        let err = register(&conn, &rule, "   ", "9876543210").unwrap_err();
        assert!(matches!(err, IdentityError::EmptyName));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = register(&conn, &rule, "Asha", "98765").unwrap_err();
        assert!(matches!(
            err,
            IdentityError::InvalidContact { expected_digits: 10 }
        ));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn lookup_unknown_contact_is_not_found() {
        let conn = setup_db();
        let err = lookup(&conn, "0000000000").unwrap_err();
        assert!(matches!(err, IdentityError::NotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn get_participant_by_id() {
        let conn = setup_db();
        let rule = ContactRule::default();
        let p = register(&conn, &rule, "Asha", "9876543210").unwrap();

        assert_eq!(get_participant(&conn, p.id).unwrap(), p);
        assert!(matches!(
            get_participant(&conn, p.id + 100),
            Err(IdentityError::NotFound(_))
        ));
    }

    #[test]
    fn participant_serializes_to_json() {
        let conn = setup_db();
        let p = register(&conn, &ContactRule::default(), "Asha", "9876543210").unwrap();
        let json = serde_json::to_value(&p).expect("should serialize");
        assert_eq!(json["name"], "Asha");
        assert_eq!(json["contact"], "9876543210");
    }
}
