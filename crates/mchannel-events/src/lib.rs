//! Event lifecycle and the message/reply board for the MChannel platform.
//!
//! An event is a named Q&A session, optionally scoped to a course. It is
//! created live and can be closed exactly once; closure is terminal and the
//! event row is kept so its messages stay readable. Participants post
//! messages to live events, and a moderator may attach a single reply to
//! each message.
//!
//! Every function takes a `rusqlite::Connection` and explicit IDs; nothing
//! is cached between calls.

mod attendance;
mod events;
mod messages;

pub use attendance::{attendee_count, join_event, leave_event, list_attendees, Attendee};
pub use events::{
    close_event, create_event, get_event, list_live_events, list_visible_live_events,
    resolve_by_name, Event, EventState,
};
pub use messages::{
    attach_reply, distinct_author_count, get_message, list_messages, list_pending_messages,
    post_message, Message,
};

use mchannel_courses::CourseError;
use mchannel_identity::IdentityError;
use mchannel_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur during event and message operations.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error("event name must not be empty")]
    EmptyName,
    #[error("event name already exists: {0}")]
    DuplicateName(String),
    #[error("event not found: {0}")]
    NotFound(String),
    #[error("course not found: {0}")]
    CourseNotFound(i64),
    #[error("participant not found: {0}")]
    ParticipantNotFound(i64),
    #[error("event {0} is closed")]
    EventClosed(i64),
    #[error("author name must not be empty")]
    EmptyAuthor,
    #[error("message body must not be empty")]
    EmptyBody,
    #[error("reply must not be empty")]
    EmptyReply,
    #[error("message not found: {0}")]
    MessageNotFound(i64),
    #[error("message {0} already has a reply")]
    AlreadyReplied(i64),
}

impl EventError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) => ErrorKind::Storage,
            Self::Identity(e) => e.kind(),
            Self::Course(e) => e.kind(),
            Self::EmptyName | Self::EmptyAuthor | Self::EmptyBody | Self::EmptyReply => {
                ErrorKind::Validation
            }
            Self::DuplicateName(_) | Self::EventClosed(_) | Self::AlreadyReplied(_) => {
                ErrorKind::Conflict
            }
            Self::NotFound(_)
            | Self::CourseNotFound(_)
            | Self::ParticipantNotFound(_)
            | Self::MessageNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Ensures an event exists, mapping a missing row to `NotFound`.
pub(crate) fn ensure_event(conn: &rusqlite::Connection, event_id: i64) -> Result<(), EventError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
        [event_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(EventError::NotFound(event_id.to_string()))
    }
}
