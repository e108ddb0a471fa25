//! Event, message and attendance handlers.

use crate::api::{actor_contact, require_moderator, resolve_actor, with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use mchannel_courses::has_declared_interest;
use mchannel_events::{
    attach_reply, attendee_count, close_event, create_event, distinct_author_count, get_event,
    join_event, leave_event, list_messages, list_pending_messages, list_visible_live_events,
    post_message, resolve_by_name, Event, Message,
};
use mchannel_identity::Participant;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    #[serde(default)]
    pub course_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct EventStats {
    pub event_id: i64,
    pub live: bool,
    pub distinct_authors: u64,
    pub attendees: u64,
}

/// Course-scoped events are only reachable by interested participants and
/// moderators.
fn ensure_visible(
    conn: &Connection,
    state: &AppState,
    actor: &Participant,
    event: &Event,
) -> Result<(), ApiError> {
    let Some(course_id) = event.course_id else {
        return Ok(());
    };
    if state.policy.is_moderator(&actor.name) || has_declared_interest(conn, actor.id, course_id)? {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "event {} is limited to course {}",
            event.id, course_id
        )))
    }
}

/// Resolves the actor and the event, and checks the event is visible.
fn visible_event(
    conn: &Connection,
    state: &AppState,
    contact: &str,
    event_id: i64,
) -> Result<(Participant, Event), ApiError> {
    let actor = resolve_actor(conn, contact)?;
    let event = get_event(conn, event_id)?;
    ensure_visible(conn, state, &actor, &event)?;
    Ok((actor, event))
}

/// POST /api/events
pub async fn create_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let contact = actor_contact(&headers)?;
    let event = with_conn(&state, move |conn, state| {
        require_moderator(conn, state, &contact)?;
        Ok(create_event(conn, &payload.name, payload.course_id)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/events/live
///
/// Moderators get every live event; everyone else gets general events plus
/// those of courses they are interested in.
pub async fn list_live_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Event>>, ApiError> {
    let contact = actor_contact(&headers)?;
    let events = with_conn(&state, move |conn, state| {
        let actor = resolve_actor(conn, &contact)?;
        Ok(list_visible_live_events(
            conn,
            state.policy.as_ref(),
            actor.id,
        )?)
    })
    .await?;
    Ok(Json(events))
}

/// GET /api/events/by-name/{name}
pub async fn resolve_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event_id = with_conn(&state, move |conn, _| Ok(resolve_by_name(conn, &name)?)).await?;
    Ok(Json(json!({ "id": event_id })))
}

/// POST /api/events/{eventId}/close
pub async fn close_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let contact = actor_contact(&headers)?;
    with_conn(&state, move |conn, state| {
        require_moderator(conn, state, &contact)?;
        Ok(close_event(conn, event_id)?)
    })
    .await?;
    Ok(Json(json!({ "status": "closed" })))
}

/// POST /api/events/{eventId}/join
pub async fn join_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let contact = actor_contact(&headers)?;
    with_conn(&state, move |conn, state| {
        let (actor, _) = visible_event(conn, state, &contact, event_id)?;
        Ok(join_event(conn, event_id, actor.id)?)
    })
    .await?;
    Ok(Json(json!({ "status": "joined" })))
}

/// POST /api/events/{eventId}/leave
pub async fn leave_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let contact = actor_contact(&headers)?;
    with_conn(&state, move |conn, _| {
        let actor = resolve_actor(conn, &contact)?;
        Ok(leave_event(conn, event_id, actor.id)?)
    })
    .await?;
    Ok(Json(json!({ "status": "left" })))
}

/// GET /api/events/{eventId}/stats
pub async fn event_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<i64>,
) -> Result<Json<EventStats>, ApiError> {
    let contact = actor_contact(&headers)?;
    let stats = with_conn(&state, move |conn, state| {
        let (_, event) = visible_event(conn, state, &contact, event_id)?;
        Ok(EventStats {
            event_id,
            live: event.live,
            distinct_authors: distinct_author_count(conn, event_id)?,
            attendees: attendee_count(conn, event_id)?,
        })
    })
    .await?;
    Ok(Json(stats))
}

/// GET /api/events/{eventId}/messages
pub async fn list_messages_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<i64>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let contact = actor_contact(&headers)?;
    let messages = with_conn(&state, move |conn, state| {
        visible_event(conn, state, &contact, event_id)?;
        Ok(list_messages(conn, event_id)?)
    })
    .await?;
    Ok(Json(messages))
}

/// GET /api/events/{eventId}/messages/pending
pub async fn list_pending_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<i64>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let contact = actor_contact(&headers)?;
    let messages = with_conn(&state, move |conn, state| {
        require_moderator(conn, state, &contact)?;
        Ok(list_pending_messages(conn, event_id)?)
    })
    .await?;
    Ok(Json(messages))
}

/// POST /api/events/{eventId}/messages
///
/// The message author is the acting participant's display name.
pub async fn post_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<i64>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let contact = actor_contact(&headers)?;
    let message = with_conn(&state, move |conn, state| {
        let (actor, _) = visible_event(conn, state, &contact, event_id)?;
        Ok(post_message(conn, event_id, &actor.name, &payload.body)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/messages/{messageId}/reply
///
/// A message takes one reply; a second attempt is a 409.
pub async fn reply_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(message_id): Path<i64>,
    Json(payload): Json<ReplyRequest>,
) -> Result<Json<Message>, ApiError> {
    let contact = actor_contact(&headers)?;
    let message = with_conn(&state, move |conn, state| {
        let actor = resolve_actor(conn, &contact)?;
        if !state.policy.can_reply(&actor.name) {
            return Err(ApiError::Forbidden(format!(
                "{} may not reply",
                actor.name
            )));
        }
        Ok(attach_reply(conn, message_id, &payload.reply, &actor.name)?)
    })
    .await?;
    Ok(Json(message))
}
