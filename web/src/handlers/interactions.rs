//! Read-only interaction history for analytics callers.

use crate::error::AppError;
use crate::extractors::EventIdPath;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use eventhub_core::types::{EventRegistrationCount, InteractionRecord};
use serde::Deserialize;

/// Ranking size when `top` is omitted.
pub const DEFAULT_TOP: usize = 10;

/// Largest ranking a caller may request.
pub const MAX_TOP: usize = 100;

/// Query string of the ranking endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct MostRegisteredParams {
    /// Number of events to return, clamped to `1..=100`
    pub top: Option<usize>,
}

impl MostRegisteredParams {
    /// Effective ranking size.
    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top.unwrap_or(DEFAULT_TOP).clamp(1, MAX_TOP)
    }
}

/// Every recorded action for an event, oldest first.
///
/// ```text
/// GET /events/{eventId}/interactions
/// ```
///
/// Unknown events yield an empty array.
///
/// # Errors
///
/// 503 `LOG_UNAVAILABLE` if the interaction store cannot be reached.
pub async fn list_interactions(
    State(state): State<AppState>,
    EventIdPath(event_id): EventIdPath,
) -> Result<Json<Vec<InteractionRecord>>, AppError> {
    let records = state.interactions.query_by_event(event_id).await?;
    Ok(Json(records))
}

/// Events ranked by net registrations.
///
/// ```text
/// GET /events/most-registered?top=N
/// ```
///
/// # Errors
///
/// 503 `LOG_UNAVAILABLE` if the interaction store cannot be reached.
pub async fn most_registered(
    State(state): State<AppState>,
    Query(params): Query<MostRegisteredParams>,
) -> Result<Json<Vec<EventRegistrationCount>>, AppError> {
    let ranked = state
        .interactions
        .query_most_registered(params.top_n())
        .await?;
    Ok(Json(ranked))
}
