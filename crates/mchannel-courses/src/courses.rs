//! Course CRUD and the removal cascade.

use crate::CourseError;
use mchannel_db::{constraint_violation, ConstraintViolation};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A course participants can declare interest in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    /// Internal database ID.
    pub id: i64,
    /// Unique, non-empty title.
    pub title: String,
    /// Creation timestamp (ISO 8601, UTC).
    pub created_at: String,
}

/// Row counts deleted by [`remove_course`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseRemoval {
    pub interests: usize,
    pub events: usize,
    pub messages: usize,
    pub attendance: usize,
}

/// Creates a course. The title is trimmed before validation and storage.
///
/// # Errors
///
/// `EmptyTitle` for a blank title, `DuplicateTitle` if the title is taken.
pub fn create_course(conn: &Connection, title: &str) -> Result<Course, CourseError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CourseError::EmptyTitle);
    }

    let course = conn
        .query_row(
            "INSERT INTO courses (title) VALUES (?1) RETURNING id, title, created_at",
            [title],
            map_row_to_course,
        )
        .map_err(|e| match constraint_violation(&e) {
            Some(ConstraintViolation::Unique) => CourseError::DuplicateTitle(title.to_string()),
            _ => CourseError::Database(e),
        })?;

    tracing::info!(course_id = course.id, title = %course.title, "course created");
    Ok(course)
}

/// Retrieves a course by ID.
pub fn get_course(conn: &Connection, course_id: i64) -> Result<Course, CourseError> {
    conn.query_row(
        "SELECT id, title, created_at FROM courses WHERE id = ?1",
        [course_id],
        map_row_to_course,
    )
    .optional()?
    .ok_or(CourseError::NotFound(course_id))
}

/// Lists all courses sorted by title ascending.
pub fn list_courses(conn: &Connection) -> Result<Vec<Course>, CourseError> {
    let mut stmt =
        conn.prepare("SELECT id, title, created_at FROM courses ORDER BY title ASC, id ASC")?;
    let rows = stmt.query_map([], map_row_to_course)?;
    let mut courses = Vec::new();
    for row in rows {
        courses.push(row?);
    }
    Ok(courses)
}

/// Counts distinct participants interested in a course.
pub fn interest_count(conn: &Connection, course_id: i64) -> Result<u64, CourseError> {
    conn.query_row(
        "SELECT (SELECT COUNT(DISTINCT participant_id) FROM interests WHERE course_id = ?1)
         FROM courses WHERE id = ?1",
        [course_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(CourseError::NotFound(course_id))
}

/// Removes a course and everything referencing it.
///
/// Deletes, in order: interests in the course, messages and attendance of
/// its events, its events, and the course itself. All deletions run in one
/// transaction; on any failure nothing is removed.
///
/// # Errors
///
/// `NotFound` if the course does not exist (nothing is deleted).
pub fn remove_course(conn: &Connection, course_id: i64) -> Result<CourseRemoval, CourseError> {
    let tx = conn.unchecked_transaction()?;

    let interests = tx.execute("DELETE FROM interests WHERE course_id = ?1", [course_id])?;
    let messages = tx.execute(
        "DELETE FROM messages WHERE event_id IN (SELECT id FROM events WHERE course_id = ?1)",
        [course_id],
    )?;
    let attendance = tx.execute(
        "DELETE FROM event_attendance
         WHERE event_id IN (SELECT id FROM events WHERE course_id = ?1)",
        [course_id],
    )?;
    let events = tx.execute("DELETE FROM events WHERE course_id = ?1", [course_id])?;
    let courses = tx.execute("DELETE FROM courses WHERE id = ?1", [course_id])?;

    if courses == 0 {
        // Dropping the transaction rolls it back.
        return Err(CourseError::NotFound(course_id));
    }
    tx.commit()?;

    let removal = CourseRemoval {
        interests,
        events,
        messages,
        attendance,
    };
    tracing::info!(
        course_id,
        interests = removal.interests,
        events = removal.events,
        messages = removal.messages,
        attendance = removal.attendance,
        "course removed"
    );
    Ok(removal)
}

fn map_row_to_course(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
    })
}
