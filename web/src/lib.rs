//! Axum HTTP surface for eventhub.
//!
//! Handlers are thin: extract the caller and event id, call the
//! [`RegistrationCoordinator`](eventhub_runtime::RegistrationCoordinator), and map
//! the outcome to a response. All capacity decisions live behind the coordinator.
//!
//! # Request Flow
//!
//! 1. **Correlation middleware** opens the `http_request` span
//! 2. **Extract** the event id (400 if not a UUID) and caller (401 if missing)
//! 3. **Coordinate** through the ledger, interaction log and channel
//! 4. **Map** the result: 202, 404, 409, 503 (+ `Retry-After`) or 500
//!
//! # Example
//!
//! ```ignore
//! use eventhub_web::{AppState, router};
//!
//! let app = router(AppState::new(coordinator, interactions));
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use extractors::{Caller, EventIdPath, RequestId};
pub use middleware::{CORRELATION_ID_HEADER, RequestCorrelationId, correlation_id_layer};
pub use routes::router;
pub use state::{AppState, DEFAULT_IDENTITY_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
