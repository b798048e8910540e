//! In-memory interaction log with failure injection.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use eventhub_core::interaction_log::{InteractionLog, InteractionLogError, rank_most_registered};
use eventhub_core::types::{EventId, EventRegistrationCount, InteractionRecord};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// `Vec`-backed [`InteractionLog`].
///
/// Records are kept in append order, which is also the order `query_by_event`
/// returns them in.
#[derive(Clone, Debug, Default)]
pub struct InMemoryInteractionLog {
    records: Arc<RwLock<Vec<InteractionRecord>>>,
    failing_appends: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryInteractionLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` appends fail.
    pub fn fail_next_appends(&self, count: usize) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    /// Make every operation fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every stored record.
    #[must_use]
    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records.read().unwrap().clone()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    fn check_available(&self) -> Result<(), InteractionLogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InteractionLogError::Unavailable(
                "interaction store unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

impl InteractionLog for InMemoryInteractionLog {
    fn append(
        &self,
        record: InteractionRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), InteractionLogError>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;
            if self
                .failing_appends
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(InteractionLogError::Unavailable(
                    "injected append failure".to_string(),
                ));
            }
            self.records.write().unwrap().push(record);
            Ok(())
        })
    }

    fn query_by_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<InteractionRecord>, InteractionLogError>> + Send + '_>>
    {
        Box::pin(async move {
            self.check_available()?;
            Ok(self
                .records
                .read()
                .unwrap()
                .iter()
                .filter(|r| r.event_id == event_id)
                .cloned()
                .collect())
        })
    }

    fn query_most_registered(
        &self,
        top_n: usize,
    ) -> Pin<
        Box<dyn Future<Output = Result<Vec<EventRegistrationCount>, InteractionLogError>> + Send + '_>,
    > {
        Box::pin(async move {
            self.check_available()?;
            let records = self.records();
            Ok(rank_most_registered(&records, top_n))
        })
    }

    fn purge_by_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<u64, InteractionLogError>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;
            let mut records = self.records.write().unwrap();
            let before = records.len();
            records.retain(|r| r.event_id != event_id);
            Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventhub_core::environment::Clock;
    use eventhub_core::types::{RegistrationAction, UserId};

    fn record(event_id: EventId, user: &str, action: RegistrationAction) -> InteractionRecord {
        InteractionRecord::new(event_id, UserId::new(user), action, crate::test_clock().now())
    }

    #[tokio::test]
    async fn query_returns_only_the_events_records_in_append_order() {
        let log = InMemoryInteractionLog::new();
        let event = EventId::new();
        let other = EventId::new();

        log.append(record(event, "a", RegistrationAction::Register)).await.unwrap();
        log.append(record(other, "a", RegistrationAction::Register)).await.unwrap();
        log.append(record(event, "a", RegistrationAction::Unregister)).await.unwrap();

        let records = log.query_by_event(event).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, RegistrationAction::Register);
        assert_eq!(records[1].action, RegistrationAction::Unregister);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_per_append() {
        let log = InMemoryInteractionLog::new();
        log.fail_next_appends(1);
        let event = EventId::new();

        assert!(log.append(record(event, "a", RegistrationAction::Register)).await.is_err());
        assert!(log.append(record(event, "a", RegistrationAction::Register)).await.is_ok());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_only_that_event() {
        let log = InMemoryInteractionLog::new();
        let event = EventId::new();
        let other = EventId::new();
        log.append(record(event, "a", RegistrationAction::Register)).await.unwrap();
        log.append(record(event, "b", RegistrationAction::Register)).await.unwrap();
        log.append(record(other, "a", RegistrationAction::Register)).await.unwrap();

        assert_eq!(log.purge_by_event(event).await, Ok(2));
        assert!(log.query_by_event(event).await.unwrap().is_empty());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_log_rejects_reads() {
        let log = InMemoryInteractionLog::new();
        log.set_unavailable(true);

        assert!(matches!(
            log.query_most_registered(10).await,
            Err(InteractionLogError::Unavailable(_))
        ));
    }
}
