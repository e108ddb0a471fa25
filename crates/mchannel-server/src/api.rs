//! Shared API plumbing plus participant and course handlers.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use mchannel_courses::{
    create_course, declare_interest, has_declared_interest, interest_count, list_courses,
    list_interested_participants, remove_course, Course, CourseError, CourseRemoval, Interest,
    InterestedParticipant,
};
use mchannel_events::EventError;
use mchannel_identity::{lookup, register, IdentityError, Participant};
use mchannel_types::ErrorKind;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Header carrying the acting participant's contact key.
pub const CONTACT_HEADER: &str = "x-mchannel-contact";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("missing participant identity")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl ApiError {
    fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Validation => Self::BadRequest(message),
            ErrorKind::Conflict => {
                tracing::warn!(error = %message, "request rejected by uniqueness rule");
                Self::Conflict(message)
            }
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Storage => {
                tracing::error!(error = %message, "store operation failed");
                Self::InternalServerError(message)
            }
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl From<CourseError> for ApiError {
    fn from(e: CourseError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl From<EventError> for ApiError {
    fn from(e: EventError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub(crate) async fn with_conn<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection, &AppState) -> Result<T, ApiError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        f(&*conn, &*state)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "blocking task join error");
        ApiError::InternalServerError("task join error".to_string())
    })?
}

/// Reads the acting participant's contact key from the request headers.
pub(crate) fn actor_contact(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(CONTACT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized)
}

/// Resolves the acting participant. An unknown contact is unauthorized.
pub(crate) fn resolve_actor(conn: &Connection, contact: &str) -> Result<Participant, ApiError> {
    match lookup(conn, contact) {
        Ok(p) => Ok(p),
        Err(IdentityError::NotFound(_)) => Err(ApiError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

/// Resolves the acting participant and requires moderator capability.
pub(crate) fn require_moderator(
    conn: &Connection,
    state: &AppState,
    contact: &str,
) -> Result<Participant, ApiError> {
    let actor = resolve_actor(conn, contact)?;
    if !state.policy.can_manage_courses_and_events(&actor.name) {
        return Err(ApiError::Forbidden(format!(
            "{} is not a moderator",
            actor.name
        )));
    }
    Ok(actor)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub contact: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct CourseInterests {
    pub course_id: i64,
    pub count: u64,
    pub participants: Vec<InterestedParticipant>,
}

/// POST /api/participants
pub async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Participant>, ApiError> {
    let participant = with_conn(&state, move |conn, state| {
        Ok(register(
            conn,
            &state.contact_rule,
            &payload.name,
            &payload.contact,
        )?)
    })
    .await?;
    Ok(Json(participant))
}

/// GET /api/participants/{contact}
pub async fn lookup_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(contact): Path<String>,
) -> Result<Json<Participant>, ApiError> {
    let participant = with_conn(&state, move |conn, _| Ok(lookup(conn, &contact)?)).await?;
    Ok(Json(participant))
}

/// POST /api/courses
pub async fn create_course_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let contact = actor_contact(&headers)?;
    let course = with_conn(&state, move |conn, state| {
        require_moderator(conn, state, &contact)?;
        Ok(create_course(conn, &payload.title)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /api/courses
pub async fn list_courses_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = with_conn(&state, |conn, _| Ok(list_courses(conn)?)).await?;
    Ok(Json(courses))
}

/// DELETE /api/courses/{courseId}
pub async fn remove_course_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseRemoval>, ApiError> {
    let contact = actor_contact(&headers)?;
    let removal = with_conn(&state, move |conn, state| {
        require_moderator(conn, state, &contact)?;
        Ok(remove_course(conn, course_id)?)
    })
    .await?;
    Ok(Json(removal))
}

/// GET /api/courses/{courseId}/interests
pub async fn list_interests_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseInterests>, ApiError> {
    let contact = actor_contact(&headers)?;
    let interests = with_conn(&state, move |conn, state| {
        require_moderator(conn, state, &contact)?;
        Ok(CourseInterests {
            course_id,
            count: interest_count(conn, course_id)?,
            participants: list_interested_participants(conn, course_id)?,
        })
    })
    .await?;
    Ok(Json(interests))
}

/// POST /api/courses/{courseId}/interest
pub async fn declare_interest_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(course_id): Path<i64>,
) -> Result<(StatusCode, Json<Interest>), ApiError> {
    let contact = actor_contact(&headers)?;
    let interest = with_conn(&state, move |conn, _| {
        let actor = resolve_actor(conn, &contact)?;
        Ok(declare_interest(conn, actor.id, course_id)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(interest)))
}

/// GET /api/courses/{courseId}/interest
pub async fn has_interest_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(course_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let contact = actor_contact(&headers)?;
    let declared = with_conn(&state, move |conn, _| {
        let actor = resolve_actor(conn, &contact)?;
        Ok(has_declared_interest(conn, actor.id, course_id)?)
    })
    .await?;
    Ok(Json(json!({ "course_id": course_id, "declared": declared })))
}
