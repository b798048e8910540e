//! Health check endpoint.
//!
//! Used by load balancers to verify the process is serving. It does NOT check
//! dependencies: a ledger or broker outage surfaces as 503s on the registration
//! endpoints instead.

use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Liveness body.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Crate version of the running binary
    pub version: &'static str,
}

/// Simple health check endpoint (for basic liveness).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ok", "version": "0.1.0" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
