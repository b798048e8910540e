//! Caller-facing error taxonomy for registration requests.
//!
//! Store-level failures ([`LedgerError`](crate::ledger::LedgerError),
//! [`ChannelError`](crate::channel::ChannelError)) are folded into
//! [`RegistrationError`] by the coordinator after its retry budget is spent.
//! Interaction log failures never reach the caller: once the ledger has
//! committed, a failed append is a logged soft inconsistency.

use crate::types::EventId;
use thiserror::Error;

/// Why a register or unregister request did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The event does not exist in the ledger.
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// Unregister was requested but the user holds no active registration.
    #[error("No active registration for event {0}")]
    NotRegistered(EventId),

    /// Every spot of the event is taken.
    #[error("Event {0} is at capacity")]
    CapacityExceeded(EventId),

    /// The user already holds an active registration for the event.
    #[error("Already registered for event {0}")]
    AlreadyRegistered(EventId),

    /// The ledger kept reporting conflicting concurrent updates (or timed out).
    #[error("Concurrent update conflict, retry later")]
    ConcurrencyConflict,

    /// The settlement intent could not be published.
    ///
    /// The ledger decision that preceded the publish still stands.
    #[error("Settlement channel unavailable, retry later")]
    ChannelUnavailable,

    /// Non-transient infrastructure failure.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl RegistrationError {
    /// Whether the caller may retry the same request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict | Self::ChannelUnavailable)
    }

    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::NotRegistered(_) => "NOT_REGISTERED",
            Self::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            Self::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::ChannelUnavailable => "CHANNEL_UNAVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(RegistrationError::ConcurrencyConflict.is_retryable());
        assert!(RegistrationError::ChannelUnavailable.is_retryable());
        assert!(!RegistrationError::CapacityExceeded(EventId::new()).is_retryable());
        assert!(!RegistrationError::Storage("disk".into()).is_retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(RegistrationError::CapacityExceeded(EventId::new()).code(), "CAPACITY_EXCEEDED");
        assert_eq!(RegistrationError::ConcurrencyConflict.code(), "CONCURRENCY_CONFLICT");
    }
}
