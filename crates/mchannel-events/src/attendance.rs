//! Event attendance: who joined which event.

use crate::{get_event, EventError};
use mchannel_db::{constraint_violation, ConstraintViolation};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A participant who joined an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attendee {
    pub participant_id: i64,
    pub name: String,
    pub joined_at: String,
}

/// Records that a participant joined a live event.
///
/// Joining again is a no-op success.
///
/// # Errors
///
/// - `NotFound` / `ParticipantNotFound` if either side does not exist.
/// - `EventClosed` if the event is no longer live.
pub fn join_event(conn: &Connection, event_id: i64, participant_id: i64) -> Result<(), EventError> {
    let inserted = conn
        .execute(
            "INSERT INTO event_attendance (event_id, participant_id)
             SELECT id, ?2 FROM events WHERE id = ?1 AND live = 1
             ON CONFLICT (event_id, participant_id) DO NOTHING",
            params![event_id, participant_id],
        )
        .map_err(|e| match constraint_violation(&e) {
            Some(ConstraintViolation::ForeignKey) => EventError::ParticipantNotFound(participant_id),
            _ => EventError::Database(e),
        })?;

    if inserted == 1 {
        tracing::debug!(event_id, participant_id, "participant joined event");
        return Ok(());
    }

    if !get_event(conn, event_id)?.live {
        return Err(EventError::EventClosed(event_id));
    }
    tracing::debug!(event_id, participant_id, "participant already attending");
    Ok(())
}

/// Removes a participant from an event's attendance. Leaving an event the
/// participant never joined is not an error.
pub fn leave_event(conn: &Connection, event_id: i64, participant_id: i64) -> Result<(), EventError> {
    crate::ensure_event(conn, event_id)?;
    let removed = conn.execute(
        "DELETE FROM event_attendance WHERE event_id = ?1 AND participant_id = ?2",
        params![event_id, participant_id],
    )?;
    if removed > 0 {
        tracing::debug!(event_id, participant_id, "participant left event");
    }
    Ok(())
}

/// Lists attendees of an event in join order.
pub fn list_attendees(conn: &Connection, event_id: i64) -> Result<Vec<Attendee>, EventError> {
    crate::ensure_event(conn, event_id)?;
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, a.joined_at
         FROM event_attendance a
         JOIN participants p ON p.id = a.participant_id
         WHERE a.event_id = ?1
         ORDER BY a.joined_at ASC, a.id ASC",
    )?;
    let rows = stmt.query_map([event_id], |row| {
        Ok(Attendee {
            participant_id: row.get(0)?,
            name: row.get(1)?,
            joined_at: row.get(2)?,
        })
    })?;
    let mut attendees = Vec::new();
    for row in rows {
        attendees.push(row?);
    }
    Ok(attendees)
}

/// Counts attendees of an event.
pub fn attendee_count(conn: &Connection, event_id: i64) -> Result<u64, EventError> {
    conn.query_row(
        "SELECT (SELECT COUNT(*) FROM event_attendance WHERE event_id = ?1)
         FROM events WHERE id = ?1",
        [event_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| EventError::NotFound(event_id.to_string()))
}
