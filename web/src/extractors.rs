//! Custom Axum extractors.
//!
//! - [`Caller`]: the authenticated user, from the identity header
//! - [`EventIdPath`]: the `{eventId}` path segment as an [`EventId`]
//! - [`RequestId`]: the request correlation id set by the middleware
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     EventIdPath(event_id): EventIdPath,
//!     Caller(user_id): Caller,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(%event_id, %user_id, "Processing request");
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::{CORRELATION_ID_HEADER, RequestCorrelationId};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use eventhub_core::types::{EventId, UserId};
use uuid::Uuid;

/// Authenticated caller identity.
///
/// The upstream authenticator has already validated the caller; this extractor only
/// reads the header named by [`AppState::identity_header`]. A missing or blank
/// header is rejected with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(&state.identity_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Self(UserId::new(s)))
            .ok_or_else(|| AppError::unauthorized("Authenticated caller identity is required"))
    }
}

/// Event id taken from the single path parameter.
///
/// Non-UUID ids are rejected with 400 `BAD_REQUEST` in the standard error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventIdPath(pub EventId);

#[async_trait]
impl<S> FromRequestParts<S> for EventIdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::bad_request("Missing event id").with_source(e))?;

        Uuid::parse_str(&raw)
            .map(|uuid| Self(EventId::from_uuid(uuid)))
            .map_err(|_| AppError::bad_request(format!("'{raw}' is not a valid event id")))
    }
}

/// Request correlation id.
///
/// Read from the extension the correlation middleware stores; without the
/// middleware, falls back to the `X-Correlation-ID` header or a new UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(RequestCorrelationId(id)) = parts.extensions.get::<RequestCorrelationId>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_request_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        let request_id = RequestId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(request_id.0, uuid);
    }

    #[tokio::test]
    async fn test_request_id_prefers_extension() {
        let stored = Uuid::new_v4();
        let mut req = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .expect("Valid request");
        req.extensions_mut().insert(RequestCorrelationId(stored));

        let (mut parts, ()) = req.into_parts();
        let request_id = RequestId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(request_id.0, stored);
    }

    #[tokio::test]
    async fn test_request_id_generates_new() {
        let req = Request::builder().body(()).expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        let request_id = RequestId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_ne!(request_id.0, Uuid::nil());
    }
}
