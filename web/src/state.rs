//! Application state shared by the HTTP handlers.

use axum::http::HeaderName;
use eventhub_core::interaction_log::InteractionLog;
use eventhub_runtime::RegistrationCoordinator;
use std::sync::Arc;

/// Header carrying the authenticated caller unless configured otherwise.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-authenticated-user";

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Registration write path
    pub coordinator: Arc<RegistrationCoordinator>,
    /// Read-only analytics queries
    pub interactions: Arc<dyn InteractionLog>,
    /// Header the upstream authenticator fills with the caller's user id
    pub identity_header: HeaderName,
}

impl AppState {
    /// Create state using [`DEFAULT_IDENTITY_HEADER`].
    #[must_use]
    pub fn new(
        coordinator: Arc<RegistrationCoordinator>,
        interactions: Arc<dyn InteractionLog>,
    ) -> Self {
        Self {
            coordinator,
            interactions,
            identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
        }
    }

    /// Trust a different identity header.
    #[must_use]
    pub fn with_identity_header(mut self, header: HeaderName) -> Self {
        self.identity_header = header;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
