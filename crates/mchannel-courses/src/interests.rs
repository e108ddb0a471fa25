//! Interest ledger: which participants want to see which courses.

use crate::CourseError;
use mchannel_db::{constraint_violation, ConstraintViolation};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A participant's declared interest in a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interest {
    pub id: i64,
    pub participant_id: i64,
    pub course_id: i64,
    /// Declaration timestamp (ISO 8601, UTC).
    pub created_at: String,
}

/// A participant listed under a course, as moderators see them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterestedParticipant {
    pub name: String,
    pub contact: String,
    pub declared_at: String,
}

/// Records that a participant is interested in a course.
///
/// A repeated declaration is rejected, not merged: the `(participant, course)`
/// pair is unique at the schema level.
///
/// # Errors
///
/// - `DuplicateInterest` if the pair already exists.
/// - `ParticipantNotFound` / `NotFound` if either side does not exist.
pub fn declare_interest(
    conn: &Connection,
    participant_id: i64,
    course_id: i64,
) -> Result<Interest, CourseError> {
    let result = conn.query_row(
        "INSERT INTO interests (participant_id, course_id) VALUES (?1, ?2)
         RETURNING id, participant_id, course_id, created_at",
        params![participant_id, course_id],
        map_row_to_interest,
    );

    let interest = match result {
        Ok(interest) => interest,
        Err(e) => {
            return Err(match constraint_violation(&e) {
                Some(ConstraintViolation::Unique) => CourseError::DuplicateInterest {
                    participant_id,
                    course_id,
                },
                Some(ConstraintViolation::ForeignKey) => {
                    missing_reference(conn, participant_id, course_id)?
                }
                _ => CourseError::Database(e),
            })
        }
    };

    tracing::info!(participant_id, course_id, "interest declared");
    Ok(interest)
}

/// Returns `true` if the participant has declared interest in the course.
pub fn has_declared_interest(
    conn: &Connection,
    participant_id: i64,
    course_id: i64,
) -> Result<bool, CourseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM interests WHERE participant_id = ?1 AND course_id = ?2)",
        params![participant_id, course_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Lists participants interested in a course, most recently declared first.
pub fn list_interested_participants(
    conn: &Connection,
    course_id: i64,
) -> Result<Vec<InterestedParticipant>, CourseError> {
    crate::get_course(conn, course_id)?;

    let mut stmt = conn.prepare(
        "SELECT p.name, p.contact, i.created_at
         FROM interests i
         JOIN participants p ON p.id = i.participant_id
         WHERE i.course_id = ?1
         ORDER BY i.created_at DESC, i.id DESC",
    )?;
    let rows = stmt.query_map([course_id], |row| {
        Ok(InterestedParticipant {
            name: row.get(0)?,
            contact: row.get(1)?,
            declared_at: row.get(2)?,
        })
    })?;

    let mut participants = Vec::new();
    for row in rows {
        participants.push(row?);
    }
    Ok(participants)
}

/// Returns the IDs of every course the participant is interested in.
pub fn list_interest_course_ids(
    conn: &Connection,
    participant_id: i64,
) -> Result<HashSet<i64>, CourseError> {
    let mut stmt = conn.prepare("SELECT course_id FROM interests WHERE participant_id = ?1")?;
    let rows = stmt.query_map([participant_id], |row| row.get(0))?;
    let mut ids = HashSet::new();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}

/// Works out which side of a failed interest insert was missing.
fn missing_reference(
    conn: &Connection,
    participant_id: i64,
    course_id: i64,
) -> Result<CourseError, CourseError> {
    let participant_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM participants WHERE id = ?1)",
        [participant_id],
        |row| row.get(0),
    )?;
    if participant_exists {
        Ok(CourseError::NotFound(course_id))
    } else {
        Ok(CourseError::ParticipantNotFound(participant_id))
    }
}

fn map_row_to_interest(row: &Row) -> rusqlite::Result<Interest> {
    Ok(Interest {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        course_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}
