//! Capacity ledger abstraction.
//!
//! The ledger is the authoritative, strongly consistent store of event capacity and
//! active registrations. It is the only place where the capacity invariant
//! `0 <= registered_count <= total_spots` is enforced.
//!
//! # Atomicity
//!
//! [`CapacityLedger::try_reserve`] and [`CapacityLedger::release`] are each a single
//! atomic step per event: existence check, registration-status check, capacity check,
//! counter update and registration row update either all happen or none do. Two
//! concurrent reservations against the last free spot must never both succeed.
//!
//! Implementations must get this from the store itself (row lock, conditional update,
//! serializable transaction) and must not serialize unrelated events against each
//! other.
//!
//! # Conflicts
//!
//! A single attempt may fail with [`LedgerError::Conflict`] when the store detects
//! a concurrent update it could not serialize. Implementations do NOT retry; the
//! `RetryingLedger` decorator in `eventhub-runtime` owns the bounded, jittered retry.
//!
//! # Implementations
//!
//! - `PostgresCapacityLedger` (in `eventhub-postgres`): production
//! - `InMemoryCapacityLedger` (in `eventhub-testing`): tests

use crate::types::{Event, EventId, NewEvent, UserId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Outcome of a reservation attempt that reached a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// A spot was taken and the registration is active
    Reserved,
    /// No spot left
    CapacityExceeded,
    /// The user already holds an active registration
    AlreadyRegistered,
    /// No such event
    EventNotFound,
}

/// Outcome of a release attempt that reached a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The spot was given back and the registration is released
    Released,
    /// The user holds no active registration
    NotRegistered,
    /// No such event
    EventNotFound,
}

/// Errors from a single ledger attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A concurrent update prevented this attempt from committing. Retryable.
    #[error("Ledger conflict: {0}")]
    Conflict(String),

    /// The attempt did not finish in time. It may still have committed, so it is
    /// never retried and the caller fails closed.
    #[error("Ledger operation timed out")]
    Timeout,

    /// The input was rejected by the ledger.
    #[error("Invalid ledger input: {0}")]
    Invalid(String),

    /// Connection or query failure.
    #[error("Ledger storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Authoritative store of event capacity and registrations.
///
/// Dyn-compatible so the coordinator can hold `Arc<dyn CapacityLedger>`.
pub trait CapacityLedger: Send + Sync {
    /// Atomically take a spot for `user_id` on `event_id`.
    ///
    /// Checks, in order: the event exists, the user has no active registration,
    /// `registered_count < total_spots`. On success increments the count and creates
    /// (or reactivates) the registration row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Conflict`] if the store aborted the attempt because of a
    /// concurrent update, or [`LedgerError::Storage`] on infrastructure failure.
    fn try_reserve(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReserveOutcome, LedgerError>> + Send + '_>>;

    /// Atomically give back the spot held by `user_id` on `event_id`.
    ///
    /// Decrements the count (floored at zero) and marks the registration released.
    ///
    /// # Errors
    ///
    /// Same as [`CapacityLedger::try_reserve`].
    fn release(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReleaseOutcome, LedgerError>> + Send + '_>>;

    /// Create an event with a zero registered count.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the row cannot be written.
    fn create_event(
        &self,
        event: NewEvent,
    ) -> Pin<Box<dyn Future<Output = Result<Event, LedgerError>> + Send + '_>>;

    /// Load an event.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the read fails.
    fn get_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Event>, LedgerError>> + Send + '_>>;

    /// Remove an event and all of its registrations. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the delete fails.
    fn delete_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<bool, LedgerError>> + Send + '_>>;
}
