//! Event creation, closure and live-event listings.

use crate::EventError;
use mchannel_db::{constraint_violation, ConstraintViolation, NOW_SQL};
use mchannel_identity::IdentityError;
use mchannel_types::{visible_events, AccessPolicy, CourseScoped};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const EVENT_COLUMNS: &str = "id, name, course_id, live, created_at, closed_at";

/// Lifecycle state of an event. `Live -> Closed` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventState {
    Live,
    Closed,
}

/// A named Q&A session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Internal database ID.
    pub id: i64,
    /// Unique, non-empty name. Names of closed events stay reserved.
    pub name: String,
    /// Linked course, or `None` for a general event visible to everyone.
    pub course_id: Option<i64>,
    /// `true` until the event is closed.
    pub live: bool,
    /// Creation timestamp (ISO 8601, UTC).
    pub created_at: String,
    /// Closure timestamp, set once when the event is closed.
    pub closed_at: Option<String>,
}

impl Event {
    pub fn state(&self) -> EventState {
        if self.live {
            EventState::Live
        } else {
            EventState::Closed
        }
    }
}

impl CourseScoped for Event {
    fn course_id(&self) -> Option<i64> {
        self.course_id
    }
}

/// Creates a live event, optionally linked to a course.
///
/// # Errors
///
/// - `EmptyName` for a blank name.
/// - `DuplicateName` if any event, live or closed, already has the name.
/// - `CourseNotFound` if `course_id` does not reference an existing course.
pub fn create_event(
    conn: &Connection,
    name: &str,
    course_id: Option<i64>,
) -> Result<Event, EventError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EventError::EmptyName);
    }

    let sql = format!(
        "INSERT INTO events (name, course_id) VALUES (?1, ?2) RETURNING {EVENT_COLUMNS}"
    );
    let event = conn
        .query_row(&sql, params![name, course_id], map_row_to_event)
        .map_err(|e| match constraint_violation(&e) {
            Some(ConstraintViolation::Unique) => EventError::DuplicateName(name.to_string()),
            Some(ConstraintViolation::ForeignKey) => {
                EventError::CourseNotFound(course_id.unwrap_or_default())
            }
            _ => EventError::Database(e),
        })?;

    tracing::info!(event_id = event.id, name = %event.name, course_id = ?event.course_id, "event created");
    Ok(event)
}

/// Closes an event. Closing an already closed event is a no-op success.
///
/// # Errors
///
/// `NotFound` if the event does not exist.
pub fn close_event(conn: &Connection, event_id: i64) -> Result<(), EventError> {
    let closed = conn.execute(
        &format!("UPDATE events SET live = 0, closed_at = {NOW_SQL} WHERE id = ?1 AND live = 1"),
        [event_id],
    )?;

    if closed == 1 {
        tracing::info!(event_id, "event closed");
        return Ok(());
    }

    crate::ensure_event(conn, event_id)?;
    tracing::debug!(event_id, "event already closed");
    Ok(())
}

/// Retrieves an event by ID.
pub fn get_event(conn: &Connection, event_id: i64) -> Result<Event, EventError> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
        [event_id],
        map_row_to_event,
    )
    .optional()?
    .ok_or_else(|| EventError::NotFound(event_id.to_string()))
}

/// Resolves an event name (exact match) to its ID.
pub fn resolve_by_name(conn: &Connection, name: &str) -> Result<i64, EventError> {
    let name = name.trim();
    conn.query_row("SELECT id FROM events WHERE name = ?1", [name], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| EventError::NotFound(name.to_string()))
}

/// Lists every live event, most recently created first.
pub fn list_live_events(conn: &Connection) -> Result<Vec<Event>, EventError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE live = 1 ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map([], map_row_to_event)?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

/// Lists the live events a participant may see, most recently created first.
///
/// General events are visible to everyone, course-scoped events only to
/// participants interested in the course, and moderators see every live
/// event.
///
/// # Errors
///
/// `ParticipantNotFound` if the participant does not exist.
pub fn list_visible_live_events(
    conn: &Connection,
    policy: &dyn AccessPolicy,
    participant_id: i64,
) -> Result<Vec<Event>, EventError> {
    let participant = match mchannel_identity::get_participant(conn, participant_id) {
        Ok(p) => p,
        Err(IdentityError::NotFound(_)) => {
            return Err(EventError::ParticipantNotFound(participant_id))
        }
        Err(e) => return Err(e.into()),
    };
    let interests = mchannel_courses::list_interest_course_ids(conn, participant_id)?;
    let live = list_live_events(conn)?;
    Ok(visible_events(policy, &participant.name, live, &interests))
}

fn map_row_to_event(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        course_id: row.get(2)?,
        live: row.get(3)?,
        created_at: row.get(4)?,
        closed_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mchannel_courses::{create_course, declare_interest};
    use mchannel_db::run_migrations;
    use mchannel_identity::{register, ContactRule};
    use mchannel_types::{ErrorKind, ModeratorAllowList};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("failed to enable foreign keys");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn create_event_starts_live() {
        let conn = setup_db();
        let event = create_event(&conn, " Talk1 ", None).expect("create failed");
        assert_eq!(event.name, "Talk1");
        assert_eq!(event.state(), EventState::Live);
        assert!(event.closed_at.is_none());
        assert_eq!(get_event(&conn, event.id).unwrap(), event);
    }

    #[test]
    fn create_event_validation_and_conflicts() {
        let conn = setup_db();
        let err = create_event(&conn, "  ", None).unwrap_err();
        assert!(matches!(err, EventError::EmptyName));
        assert_eq!(err.kind(), ErrorKind::Validation);

        create_event(&conn, "Talk1", None).unwrap();
        let err = create_event(&conn, "Talk1", None).unwrap_err();
        assert!(matches!(err, EventError::DuplicateName(ref n) if n == "Talk1"));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = create_event(&conn, "Talk2", Some(404)).unwrap_err();
        assert!(matches!(err, EventError::CourseNotFound(404)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn closed_event_names_stay_reserved() {
        let conn = setup_db();
        let event = create_event(&conn, "Talk1", None).unwrap();
        close_event(&conn, event.id).unwrap();
        assert!(matches!(
            create_event(&conn, "Talk1", None),
            Err(EventError::DuplicateName(_))
        ));
    }

    #[test]
    fn close_event_is_terminal_and_idempotent() {
        let conn = setup_db();
        let event = create_event(&conn, "Talk1", None).unwrap();

        close_event(&conn, event.id).expect("first close failed");
        let closed = get_event(&conn, event.id).unwrap();
        assert_eq!(closed.state(), EventState::Closed);
        let closed_at = closed.closed_at.clone().expect("closed_at should be set");

        close_event(&conn, event.id).expect("second close should be a no-op");
        let again = get_event(&conn, event.id).unwrap();
        assert_eq!(again.closed_at, Some(closed_at));

        let err = close_event(&conn, 999).unwrap_err();
        assert!(matches!(err, EventError::NotFound(_)));
    }

    #[test]
    fn live_events_newest_first_and_exclude_closed() {
        let conn = setup_db();
        let a = create_event(&conn, "A", None).unwrap();
        create_event(&conn, "B", None).unwrap();
        create_event(&conn, "C", None).unwrap();
        close_event(&conn, a.id).unwrap();

        let live = list_live_events(&conn).unwrap();
        assert_eq!(names(&live), vec!["C", "B"]);
    }

    #[test]
    fn resolve_by_name_exact_match() {
        let conn = setup_db();
        let event = create_event(&conn, "Talk1", None).unwrap();
        assert_eq!(resolve_by_name(&conn, "Talk1").unwrap(), event.id);
        assert!(matches!(
            resolve_by_name(&conn, "talk1"),
            Err(EventError::NotFound(_))
        ));
    }

    #[test]
    fn visibility_follows_interest_and_role() {
        let conn = setup_db();
        let rule = ContactRule::default();
        let policy = ModeratorAllowList::new(["Host"]);

        let host = register(&conn, &rule, "Host", "1000000000").unwrap();
        let asha = register(&conn, &rule, "Asha", "1111111111").unwrap();
        let ravi = register(&conn, &rule, "Ravi", "2222222222").unwrap();

        let resilience = create_course(&conn, "Resilience").unwrap();
        let focus = create_course(&conn, "Focus").unwrap();
        declare_interest(&conn, asha.id, resilience.id).unwrap();

        create_event(&conn, "General", None).unwrap();
        create_event(&conn, "Talk1", Some(resilience.id)).unwrap();
        create_event(&conn, "Deep Work", Some(focus.id)).unwrap();
        let closed = create_event(&conn, "Old", None).unwrap();
        close_event(&conn, closed.id).unwrap();

        let asha_view = list_visible_live_events(&conn, &policy, asha.id).unwrap();
        assert_eq!(names(&asha_view), vec!["Talk1", "General"]);

        let ravi_view = list_visible_live_events(&conn, &policy, ravi.id).unwrap();
        assert_eq!(names(&ravi_view), vec!["General"]);

        let host_view = list_visible_live_events(&conn, &policy, host.id).unwrap();
        assert_eq!(names(&host_view), vec!["Deep Work", "Talk1", "General"]);

        let err = list_visible_live_events(&conn, &policy, 999).unwrap_err();
        assert!(matches!(err, EventError::ParticipantNotFound(999)));
    }

    #[test]
    fn event_serializes_with_optional_course() {
        let conn = setup_db();
        let event = create_event(&conn, "General", None).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "General");
        assert!(json["course_id"].is_null());
        assert_eq!(json["live"], true);
    }
}
