//! Event deletion.

use crate::error::AppError;
use crate::extractors::{Caller, EventIdPath};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode};

/// Delete an event together with its interaction history.
///
/// Administrative authorization is enforced upstream; the handler only requires an
/// authenticated caller.
///
/// # Endpoint
///
/// ```text
/// DELETE /events/{eventId}
/// ```
///
/// # Errors
///
/// - 404 `EVENT_NOT_FOUND`
/// - 500 `STORAGE_ERROR` when the purge or the ledger delete fails; the event is
///   kept if the purge did not complete
pub async fn delete_event(
    State(state): State<AppState>,
    EventIdPath(event_id): EventIdPath,
    Caller(user_id): Caller,
) -> Result<StatusCode, AppError> {
    tracing::info!(%event_id, %user_id, "Event deletion requested");
    state.coordinator.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
