//! MChannel server library logic.
//!
//! A thin JSON surface over the store crates. Handlers take a pooled
//! connection inside `spawn_blocking`, call one store operation, and map its
//! error kind to an HTTP status. No state is cached between requests.

pub mod api;
pub mod api_events;
pub mod config;

use axum::{
    routing::{delete, get, post},
    Extension, Json, Router,
};
use mchannel_db::DbPool;
use mchannel_identity::ContactRule;
use mchannel_types::AccessPolicy;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Moderator policy.
    pub policy: Arc<dyn AccessPolicy>,
    /// Contact-key format for registration.
    pub contact_rule: ContactRule,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/participants", post(api::register_handler))
        .route("/api/participants/{contact}", get(api::lookup_handler))
        .route(
            "/api/courses",
            post(api::create_course_handler).get(api::list_courses_handler),
        )
        .route(
            "/api/courses/{courseId}",
            delete(api::remove_course_handler),
        )
        .route(
            "/api/courses/{courseId}/interests",
            get(api::list_interests_handler),
        )
        .route(
            "/api/courses/{courseId}/interest",
            post(api::declare_interest_handler).get(api::has_interest_handler),
        )
        .route("/api/events", post(api_events::create_event_handler))
        .route("/api/events/live", get(api_events::list_live_events_handler))
        .route(
            "/api/events/by-name/{name}",
            get(api_events::resolve_event_handler),
        )
        .route(
            "/api/events/{eventId}/close",
            post(api_events::close_event_handler),
        )
        .route(
            "/api/events/{eventId}/join",
            post(api_events::join_event_handler),
        )
        .route(
            "/api/events/{eventId}/leave",
            post(api_events::leave_event_handler),
        )
        .route(
            "/api/events/{eventId}/stats",
            get(api_events::event_stats_handler),
        )
        .route(
            "/api/events/{eventId}/messages",
            get(api_events::list_messages_handler).post(api_events::post_message_handler),
        )
        .route(
            "/api/events/{eventId}/messages/pending",
            get(api_events::list_pending_handler),
        )
        .route(
            "/api/messages/{messageId}/reply",
            post(api_events::reply_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
