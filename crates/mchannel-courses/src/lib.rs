//! Course registry and interest ledger for the MChannel platform.
//!
//! Courses are topics moderators create; participants declare interest in
//! them, and that interest decides which course-scoped events they can see.
//! Removing a course removes everything that hangs off it in one
//! transaction: interests, the linked events, and those events' messages
//! and attendance.

mod courses;
mod interests;

pub use courses::{
    create_course, get_course, interest_count, list_courses, remove_course, Course,
    CourseRemoval,
};
pub use interests::{
    declare_interest, has_declared_interest, list_interest_course_ids,
    list_interested_participants, Interest, InterestedParticipant,
};

use mchannel_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur during course and interest operations.
#[derive(Debug, Error)]
pub enum CourseError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("course title must not be empty")]
    EmptyTitle,
    #[error("course title already exists: {0}")]
    DuplicateTitle(String),
    #[error("course not found: {0}")]
    NotFound(i64),
    #[error("participant not found: {0}")]
    ParticipantNotFound(i64),
    #[error("participant {participant_id} already declared interest in course {course_id}")]
    DuplicateInterest { participant_id: i64, course_id: i64 },
}

impl CourseError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) => ErrorKind::Storage,
            Self::EmptyTitle => ErrorKind::Validation,
            Self::DuplicateTitle(_) | Self::DuplicateInterest { .. } => ErrorKind::Conflict,
            Self::NotFound(_) | Self::ParticipantNotFound(_) => ErrorKind::NotFound,
        }
    }
}
