//! Bounded retry and per-attempt timeout around a [`CapacityLedger`].
//!
//! Only [`LedgerError::Conflict`] is retried: the store rolled the attempt back, so
//! another try starts from a clean state. A timed-out attempt may still commit after
//! the caller gave up, so [`LedgerError::Timeout`] is returned at once and the caller
//! fails closed. `create_event` and `delete_event` are never retried.

use crate::metrics::LedgerMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use eventhub_core::ledger::{CapacityLedger, LedgerError, ReleaseOutcome, ReserveOutcome};
use eventhub_core::types::{Event, EventId, NewEvent, UserId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decorator adding retry-on-conflict to any [`CapacityLedger`].
#[derive(Clone)]
pub struct RetryingLedger {
    inner: Arc<dyn CapacityLedger>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl RetryingLedger {
    /// Wrap `inner` with the given retry policy and per-attempt timeout.
    #[must_use]
    pub fn new(inner: Arc<dyn CapacityLedger>, policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            attempt_timeout,
        }
    }

    async fn attempt<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let started = Instant::now();
        let attempt_timeout = self.attempt_timeout;

        let result = retry_with_predicate(
            self.policy.clone(),
            || {
                let fut = call();
                async move {
                    let outcome = with_timeout(attempt_timeout, fut).await;
                    if let Err(LedgerError::Conflict(_)) = &outcome {
                        LedgerMetrics::record_conflict();
                    }
                    outcome
                }
            },
            LedgerError::is_retryable,
        )
        .await;

        finish(operation, started, result)
    }

    async fn once<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, LedgerError>
    where
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let started = Instant::now();
        let result = with_timeout(self.attempt_timeout, fut).await;
        finish(operation, started, result)
    }
}

async fn with_timeout<T, Fut>(limit: Duration, fut: Fut) -> Result<T, LedgerError>
where
    Fut: Future<Output = Result<T, LedgerError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(LedgerError::Timeout))
}

fn finish<T>(
    operation: &'static str,
    started: Instant,
    result: Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    LedgerMetrics::record_operation(operation, started.elapsed());
    if let Err(e) = &result {
        tracing::warn!(operation, error = %e, "Ledger operation failed");
    }
    result
}

impl CapacityLedger for RetryingLedger {
    fn try_reserve(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReserveOutcome, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.attempt("try_reserve", || self.inner.try_reserve(event_id, user_id.clone()))
                .await
        })
    }

    fn release(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReleaseOutcome, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.attempt("release", || self.inner.release(event_id, user_id.clone()))
                .await
        })
    }

    fn create_event(
        &self,
        event: NewEvent,
    ) -> Pin<Box<dyn Future<Output = Result<Event, LedgerError>> + Send + '_>> {
        Box::pin(async move { self.once("create_event", self.inner.create_event(event)).await })
    }

    fn get_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Event>, LedgerError>> + Send + '_>> {
        Box::pin(async move { self.attempt("get_event", || self.inner.get_event(event_id)).await })
    }

    fn delete_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<bool, LedgerError>> + Send + '_>> {
        Box::pin(async move { self.once("delete_event", self.inner.delete_event(event_id)).await })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use eventhub_testing::InMemoryCapacityLedger;

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let inner = Arc::new(InMemoryCapacityLedger::new());
        let event = inner
            .create_event(NewEvent::new("Rust meetup", UserId::new("organizer")).with_total_spots(1))
            .await
            .unwrap();
        inner.fail_next_with_conflicts(2);

        let ledger = RetryingLedger::new(inner.clone(), fast_policy(3), Duration::from_secs(1));
        let outcome = ledger.try_reserve(event.id, UserId::new("alice")).await;

        assert_eq!(outcome, Ok(ReserveOutcome::Reserved));
        assert_eq!(inner.registered_count(event.id), Some(1));
    }

    #[tokio::test]
    async fn exhausted_conflicts_are_returned() {
        let inner = Arc::new(InMemoryCapacityLedger::new());
        let event = inner
            .create_event(NewEvent::new("Rust meetup", UserId::new("organizer")))
            .await
            .unwrap();
        inner.fail_next_with_conflicts(10);

        let ledger = RetryingLedger::new(inner.clone(), fast_policy(3), Duration::from_secs(1));
        let outcome = ledger.try_reserve(event.id, UserId::new("alice")).await;

        assert!(matches!(outcome, Err(LedgerError::Conflict(_))));
        assert_eq!(inner.registered_count(event.id), Some(0));
        // One initial attempt plus three retries consumed four injected conflicts
        assert_eq!(inner.pending_conflicts(), 6);
    }

    #[tokio::test]
    async fn storage_errors_are_not_retried() {
        let inner = Arc::new(InMemoryCapacityLedger::new());
        inner.set_unavailable(true);

        let ledger = RetryingLedger::new(inner.clone(), fast_policy(3), Duration::from_secs(1));
        let outcome = ledger.get_event(EventId::new()).await;

        assert!(matches!(outcome, Err(LedgerError::Storage(_))));
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let inner = Arc::new(InMemoryCapacityLedger::new());
        let event = inner
            .create_event(NewEvent::new("Rust meetup", UserId::new("organizer")))
            .await
            .unwrap();
        inner.set_latency(Duration::from_millis(200));

        let ledger = RetryingLedger::new(inner.clone(), fast_policy(1), Duration::from_millis(20));
        let outcome = ledger.try_reserve(event.id, UserId::new("alice")).await;

        assert_eq!(outcome, Err(LedgerError::Timeout));
    }

    #[tokio::test]
    async fn late_commit_is_not_retried() {
        let inner = Arc::new(InMemoryCapacityLedger::new());
        let event = inner
            .create_event(NewEvent::new("Rust meetup", UserId::new("organizer")))
            .await
            .unwrap();
        inner.set_commit_latency(Duration::from_millis(200));

        let ledger = RetryingLedger::new(inner.clone(), fast_policy(3), Duration::from_millis(20));
        let outcome = ledger.try_reserve(event.id, UserId::new("alice")).await;

        assert_eq!(outcome, Err(LedgerError::Timeout));
        assert_eq!(inner.registered_count(event.id), Some(1));
    }

    #[tokio::test]
    async fn create_event_is_attempted_once() {
        let inner = Arc::new(InMemoryCapacityLedger::new());
        inner.set_commit_latency(Duration::from_millis(200));

        let ledger = RetryingLedger::new(inner.clone(), fast_policy(3), Duration::from_millis(20));
        let outcome = ledger
            .create_event(NewEvent::new("Rust meetup", UserId::new("organizer")))
            .await;

        assert_eq!(outcome, Err(LedgerError::Timeout));
        assert_eq!(inner.event_count(), 1);
    }
}
