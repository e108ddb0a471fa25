//! The message/reply board.
//!
//! Messages are append-only. The only mutation is attaching a reply, which
//! happens at most once per message: a second attempt is rejected with
//! `AlreadyReplied` and leaves the first reply in place.

use crate::{ensure_event, EventError};
use mchannel_db::NOW_SQL;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const MESSAGE_COLUMNS: &str =
    "id, event_id, author, body, reply, reply_author, created_at, replied_at";

/// A participant's message within an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Internal database ID; increases with insertion order.
    pub id: i64,
    /// The event this message belongs to.
    pub event_id: i64,
    /// Display name of the author.
    pub author: String,
    /// Message body (non-empty).
    pub body: String,
    /// The moderator's reply, if one has been attached.
    pub reply: Option<String>,
    /// Display name of the moderator who replied.
    pub reply_author: Option<String>,
    /// Store-assigned creation timestamp (ISO 8601, UTC).
    pub created_at: String,
    /// Store-assigned reply timestamp.
    pub replied_at: Option<String>,
}

impl Message {
    /// Returns `true` once a reply has been attached.
    pub fn is_answered(&self) -> bool {
        self.reply.is_some()
    }
}

/// Posts a message to a live event.
///
/// The event check and the insert are one statement, so a message can never
/// land in an event that was closed before the insert ran. The stored
/// timestamp is never earlier than the event's latest message, so a clock
/// stepping backwards cannot reorder the board.
///
/// # Errors
///
/// - `EmptyAuthor` / `EmptyBody` for blank input.
/// - `NotFound` if the event does not exist.
/// - `EventClosed` if the event is no longer live.
pub fn post_message(
    conn: &Connection,
    event_id: i64,
    author: &str,
    body: &str,
) -> Result<Message, EventError> {
    let author = author.trim();
    let body = body.trim();
    if author.is_empty() {
        return Err(EventError::EmptyAuthor);
    }
    if body.is_empty() {
        return Err(EventError::EmptyBody);
    }

    let message = conn
        .query_row(
            &format!(
                "INSERT INTO messages (event_id, author, body, created_at)
                 SELECT e.id, ?2, ?3, MAX({NOW_SQL}, COALESCE(
                     (SELECT MAX(created_at) FROM messages WHERE event_id = ?1), ''))
                 FROM events e WHERE e.id = ?1 AND e.live = 1
                 RETURNING {MESSAGE_COLUMNS}"
            ),
            params![event_id, author, body],
            map_row_to_message,
        )
        .optional()?;

    match message {
        Some(message) => {
            tracing::debug!(event_id, message_id = message.id, "message posted");
            Ok(message)
        }
        None => {
            ensure_event(conn, event_id)?;
            Err(EventError::EventClosed(event_id))
        }
    }
}

/// Attaches a reply to a message that has none yet.
///
/// # Errors
///
/// - `EmptyReply` / `EmptyAuthor` for blank input.
/// - `MessageNotFound` if the message does not exist.
/// - `AlreadyReplied` if the message already carries a reply.
pub fn attach_reply(
    conn: &Connection,
    message_id: i64,
    reply: &str,
    moderator_name: &str,
) -> Result<Message, EventError> {
    let reply = reply.trim();
    let moderator_name = moderator_name.trim();
    if reply.is_empty() {
        return Err(EventError::EmptyReply);
    }
    if moderator_name.is_empty() {
        return Err(EventError::EmptyAuthor);
    }

    let updated = conn
        .query_row(
            &format!(
                "UPDATE messages SET reply = ?2, reply_author = ?3, replied_at = {NOW_SQL}
                 WHERE id = ?1 AND reply IS NULL
                 RETURNING {MESSAGE_COLUMNS}"
            ),
            params![message_id, reply, moderator_name],
            map_row_to_message,
        )
        .optional()?;

    match updated {
        Some(message) => {
            tracing::info!(
                event_id = message.event_id,
                message_id,
                reply_author = %moderator_name,
                "reply attached"
            );
            Ok(message)
        }
        None => {
            // Either the message is missing or someone replied first.
            get_message(conn, message_id)?;
            Err(EventError::AlreadyReplied(message_id))
        }
    }
}

/// Retrieves a message by ID.
pub fn get_message(conn: &Connection, message_id: i64) -> Result<Message, EventError> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        [message_id],
        map_row_to_message,
    )
    .optional()?
    .ok_or(EventError::MessageNotFound(message_id))
}

/// Lists an event's messages in board order: by creation time, ties broken
/// by insertion order. Works for live and closed events alike.
pub fn list_messages(conn: &Connection, event_id: i64) -> Result<Vec<Message>, EventError> {
    query_messages(conn, event_id, false)
}

/// Lists an event's unanswered messages in board order.
pub fn list_pending_messages(
    conn: &Connection,
    event_id: i64,
) -> Result<Vec<Message>, EventError> {
    query_messages(conn, event_id, true)
}

/// Counts distinct author names across an event's messages.
///
/// This counts people who posted, not people who merely joined.
pub fn distinct_author_count(conn: &Connection, event_id: i64) -> Result<u64, EventError> {
    conn.query_row(
        "SELECT (SELECT COUNT(DISTINCT author) FROM messages WHERE event_id = ?1)
         FROM events WHERE id = ?1",
        [event_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| EventError::NotFound(event_id.to_string()))
}

fn query_messages(
    conn: &Connection,
    event_id: i64,
    pending_only: bool,
) -> Result<Vec<Message>, EventError> {
    ensure_event(conn, event_id)?;

    let filter = if pending_only { "AND reply IS NULL" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE event_id = ?1 {filter}
         ORDER BY created_at ASC, id ASC"
    ))?;

    let rows = stmt.query_map([event_id], map_row_to_message)?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

fn map_row_to_message(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        event_id: row.get(1)?,
        author: row.get(2)?,
        body: row.get(3)?,
        reply: row.get(4)?,
        reply_author: row.get(5)?,
        created_at: row.get(6)?,
        replied_at: row.get(7)?,
    })
}
