//! Register and unregister endpoints.
//!
//! Both return 202 once the ledger decision is committed and the settlement intent
//! is published; settlement itself happens asynchronously downstream.

use crate::error::AppError;
use crate::extractors::{Caller, EventIdPath, RequestId};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use eventhub_core::types::RegistrationAction;
use eventhub_runtime::Accepted;
use serde::{Deserialize, Serialize};

/// Body of a 202 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    /// Correlation id of the published settlement intent
    pub correlation_id: String,
    /// Always `"accepted"`
    pub status: String,
    /// Human-readable summary
    pub message: String,
}

impl From<Accepted> for AcceptedResponse {
    fn from(accepted: Accepted) -> Self {
        let message = match accepted.action {
            RegistrationAction::Register => "Registration accepted",
            RegistrationAction::Unregister => "Unregistration accepted",
        };
        Self {
            correlation_id: accepted.correlation_id.to_string(),
            status: "accepted".to_string(),
            message: message.to_string(),
        }
    }
}

/// Register the caller for an event.
///
/// # Endpoint
///
/// ```text
/// POST /events/{eventId}/register
/// ```
///
/// # Errors
///
/// - 404 `EVENT_NOT_FOUND`
/// - 409 `CAPACITY_EXCEEDED` or `ALREADY_REGISTERED`
/// - 503 `CONCURRENCY_CONFLICT` or `CHANNEL_UNAVAILABLE` (with `Retry-After`)
pub async fn register(
    State(state): State<AppState>,
    EventIdPath(event_id): EventIdPath,
    Caller(user_id): Caller,
    RequestId(request_id): RequestId,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    tracing::debug!(%event_id, %user_id, %request_id, "Register requested");
    let accepted = state.coordinator.register(event_id, user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.into())))
}

/// Release the caller's registration.
///
/// # Endpoint
///
/// ```text
/// DELETE /events/{eventId}/unregister
/// ```
///
/// # Errors
///
/// - 404 `EVENT_NOT_FOUND` or `NOT_REGISTERED`
/// - 503 `CONCURRENCY_CONFLICT` or `CHANNEL_UNAVAILABLE` (with `Retry-After`)
pub async fn unregister(
    State(state): State<AppState>,
    EventIdPath(event_id): EventIdPath,
    Caller(user_id): Caller,
    RequestId(request_id): RequestId,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    tracing::debug!(%event_id, %user_id, %request_id, "Unregister requested");
    let accepted = state.coordinator.unregister(event_id, user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.into())))
}
