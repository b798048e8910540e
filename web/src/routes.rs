//! Router assembly.

use crate::handlers::{
    delete_event, health_check, list_interactions, most_registered, register, unregister,
};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// Build the HTTP surface.
///
/// ```text
/// DELETE /events/:id
/// POST   /events/:id/register
/// DELETE /events/:id/unregister
/// GET    /events/:id/interactions
/// GET    /events/most-registered?top=N
/// GET    /health
/// ```
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events/most-registered", get(most_registered))
        .route("/events/:id", delete(delete_event))
        .route("/events/:id/register", post(register))
        .route("/events/:id/unregister", delete(unregister))
        .route("/events/:id/interactions", get(list_interactions))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
