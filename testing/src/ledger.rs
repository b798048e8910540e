//! In-memory capacity ledger.
//!
//! Each event lives behind its own mutex, so reservations on different events never
//! contend. Failure injection covers the conditions the coordinator must survive:
//! serialization conflicts, slow attempts, replies that arrive after the commit
//! and an unreachable store.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use eventhub_core::ledger::{CapacityLedger, LedgerError, ReleaseOutcome, ReserveOutcome};
use eventhub_core::types::{Event, EventId, NewEvent, RegistrationStatus, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

#[derive(Debug)]
struct EventSlot {
    event: Event,
    registrations: HashMap<UserId, RegistrationStatus>,
}

/// `HashMap`-backed [`CapacityLedger`] for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use eventhub_testing::InMemoryCapacityLedger;
/// use eventhub_core::ledger::{CapacityLedger, ReserveOutcome};
/// use eventhub_core::types::{NewEvent, UserId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = InMemoryCapacityLedger::new();
/// let event = ledger
///     .create_event(NewEvent::new("Workshop", UserId::new("organizer")).with_total_spots(1))
///     .await?;
///
/// let outcome = ledger.try_reserve(event.id, UserId::new("alice")).await?;
/// assert_eq!(outcome, ReserveOutcome::Reserved);
/// assert_eq!(ledger.registered_count(event.id), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryCapacityLedger {
    events: Arc<RwLock<HashMap<EventId, Arc<Mutex<EventSlot>>>>>,
    pending_conflicts: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    latency: Arc<RwLock<Option<Duration>>>,
    commit_latency: Arc<RwLock<Option<Duration>>>,
}

impl InMemoryCapacityLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` reserve/release attempts fail with [`LedgerError::Conflict`].
    pub fn fail_next_with_conflicts(&self, count: usize) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Injected conflicts not yet consumed.
    #[must_use]
    pub fn pending_conflicts(&self) -> usize {
        self.pending_conflicts.load(Ordering::SeqCst)
    }

    /// Make every operation fail with [`LedgerError::Storage`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every operation before it touches any state.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write().unwrap() = Some(latency);
    }

    /// Delay the reply of reserve, release and create after the change is applied.
    pub fn set_commit_latency(&self, latency: Duration) {
        *self.commit_latency.write().unwrap() = Some(latency);
    }

    /// Number of stored events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Current registered count of an event.
    #[must_use]
    pub fn registered_count(&self, event_id: EventId) -> Option<u32> {
        let slot = self.slot(event_id)?;
        let count = slot.lock().unwrap().event.registered_count;
        Some(count)
    }

    /// Registration status of a user on an event.
    #[must_use]
    pub fn registration_status(
        &self,
        event_id: EventId,
        user_id: &UserId,
    ) -> Option<RegistrationStatus> {
        let slot = self.slot(event_id)?;
        let slot = slot.lock().unwrap();
        slot.registrations.get(user_id).copied()
    }

    /// Number of users with an active registration on an event.
    #[must_use]
    pub fn active_registrations(&self, event_id: EventId) -> usize {
        let Some(slot) = self.slot(event_id) else {
            return 0;
        };
        let slot = slot.lock().unwrap();
        slot.registrations
            .values()
            .filter(|status| **status == RegistrationStatus::Active)
            .count()
    }

    fn slot(&self, event_id: EventId) -> Option<Arc<Mutex<EventSlot>>> {
        self.events.read().unwrap().get(&event_id).cloned()
    }

    async fn enter(&self, contended: bool) -> Result<(), LedgerError> {
        let latency = *self.latency.read().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage("ledger unavailable".to_string()));
        }
        if contended
            && self
                .pending_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(LedgerError::Conflict("injected serialization failure".to_string()));
        }
        Ok(())
    }

    async fn reply<T>(&self, value: T) -> Result<T, LedgerError> {
        let latency = *self.commit_latency.read().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(value)
    }

    fn reserve_now(&self, event_id: EventId, user_id: UserId) -> ReserveOutcome {
        let Some(slot) = self.slot(event_id) else {
            return ReserveOutcome::EventNotFound;
        };
        let mut slot = slot.lock().unwrap();

        if slot.registrations.get(&user_id) == Some(&RegistrationStatus::Active) {
            return ReserveOutcome::AlreadyRegistered;
        }
        if slot.event.registered_count >= slot.event.total_spots {
            return ReserveOutcome::CapacityExceeded;
        }

        slot.event.registered_count += 1;
        slot.registrations.insert(user_id, RegistrationStatus::Active);
        ReserveOutcome::Reserved
    }

    fn release_now(&self, event_id: EventId, user_id: &UserId) -> ReleaseOutcome {
        let Some(slot) = self.slot(event_id) else {
            return ReleaseOutcome::EventNotFound;
        };
        let mut slot = slot.lock().unwrap();

        match slot.registrations.get_mut(user_id) {
            Some(status) if *status == RegistrationStatus::Active => {
                *status = RegistrationStatus::Released;
            }
            _ => return ReleaseOutcome::NotRegistered,
        }
        slot.event.registered_count = slot.event.registered_count.saturating_sub(1);
        ReleaseOutcome::Released
    }
}

impl CapacityLedger for InMemoryCapacityLedger {
    fn try_reserve(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReserveOutcome, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.enter(true).await?;
            let outcome = self.reserve_now(event_id, user_id);
            self.reply(outcome).await
        })
    }

    fn release(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReleaseOutcome, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.enter(true).await?;
            let outcome = self.release_now(event_id, &user_id);
            self.reply(outcome).await
        })
    }

    fn create_event(
        &self,
        event: NewEvent,
    ) -> Pin<Box<dyn Future<Output = Result<Event, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.enter(false).await?;

            if event.name.trim().is_empty() {
                return Err(LedgerError::Invalid("event name is required".to_string()));
            }

            let event = event.into_event(EventId::new());
            self.events.write().unwrap().insert(
                event.id,
                Arc::new(Mutex::new(EventSlot {
                    event: event.clone(),
                    registrations: HashMap::new(),
                })),
            );
            self.reply(event).await
        })
    }

    fn get_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Event>, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.enter(false).await?;
            let Some(slot) = self.slot(event_id) else {
                return Ok(None);
            };
            let event = slot.lock().unwrap().event.clone();
            Ok(Some(event))
        })
    }

    fn delete_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<bool, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            self.enter(false).await?;
            Ok(self.events.write().unwrap().remove(&event_id).is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn event_with_spots(ledger: &InMemoryCapacityLedger, spots: u32) -> Event {
        ledger
            .create_event(NewEvent::new("Concert", UserId::new("organizer")).with_total_spots(spots))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reserve_until_full() {
        let ledger = InMemoryCapacityLedger::new();
        let event = event_with_spots(&ledger, 2).await;

        assert_eq!(
            ledger.try_reserve(event.id, UserId::new("a")).await,
            Ok(ReserveOutcome::Reserved)
        );
        assert_eq!(
            ledger.try_reserve(event.id, UserId::new("b")).await,
            Ok(ReserveOutcome::Reserved)
        );
        assert_eq!(
            ledger.try_reserve(event.id, UserId::new("c")).await,
            Ok(ReserveOutcome::CapacityExceeded)
        );
        assert_eq!(ledger.registered_count(event.id), Some(2));
    }

    #[tokio::test]
    async fn duplicate_reservation_is_rejected() {
        let ledger = InMemoryCapacityLedger::new();
        let event = event_with_spots(&ledger, 5).await;

        ledger.try_reserve(event.id, UserId::new("a")).await.unwrap();
        assert_eq!(
            ledger.try_reserve(event.id, UserId::new("a")).await,
            Ok(ReserveOutcome::AlreadyRegistered)
        );
        assert_eq!(ledger.registered_count(event.id), Some(1));
    }

    #[tokio::test]
    async fn release_reactivates_on_next_reserve() {
        let ledger = InMemoryCapacityLedger::new();
        let event = event_with_spots(&ledger, 1).await;
        let user = UserId::new("a");

        ledger.try_reserve(event.id, user.clone()).await.unwrap();
        assert_eq!(
            ledger.release(event.id, user.clone()).await,
            Ok(ReleaseOutcome::Released)
        );
        assert_eq!(
            ledger.registration_status(event.id, &user),
            Some(RegistrationStatus::Released)
        );
        assert_eq!(
            ledger.release(event.id, user.clone()).await,
            Ok(ReleaseOutcome::NotRegistered)
        );
        assert_eq!(
            ledger.try_reserve(event.id, user.clone()).await,
            Ok(ReserveOutcome::Reserved)
        );
        assert_eq!(ledger.registered_count(event.id), Some(1));
    }

    #[tokio::test]
    async fn unknown_event() {
        let ledger = InMemoryCapacityLedger::new();
        let missing = EventId::new();

        assert_eq!(
            ledger.try_reserve(missing, UserId::new("a")).await,
            Ok(ReserveOutcome::EventNotFound)
        );
        assert_eq!(
            ledger.release(missing, UserId::new("a")).await,
            Ok(ReleaseOutcome::EventNotFound)
        );
        assert_eq!(ledger.get_event(missing).await, Ok(None));
        assert_eq!(ledger.delete_event(missing).await, Ok(false));
    }

    #[tokio::test]
    async fn zero_spot_event_is_always_full() {
        let ledger = InMemoryCapacityLedger::new();
        let event = event_with_spots(&ledger, 0).await;

        assert_eq!(
            ledger.try_reserve(event.id, UserId::new("a")).await,
            Ok(ReserveOutcome::CapacityExceeded)
        );
    }

    #[tokio::test]
    async fn blank_name_is_invalid() {
        let ledger = InMemoryCapacityLedger::new();
        let result = ledger
            .create_event(NewEvent::new("  ", UserId::new("organizer")))
            .await;

        assert!(matches!(result, Err(LedgerError::Invalid(_))));
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed_one_per_attempt() {
        let ledger = InMemoryCapacityLedger::new();
        let event = event_with_spots(&ledger, 1).await;
        ledger.fail_next_with_conflicts(1);

        assert!(matches!(
            ledger.try_reserve(event.id, UserId::new("a")).await,
            Err(LedgerError::Conflict(_))
        ));
        assert_eq!(ledger.pending_conflicts(), 0);
        assert_eq!(ledger.registered_count(event.id), Some(0));
        assert_eq!(
            ledger.try_reserve(event.id, UserId::new("a")).await,
            Ok(ReserveOutcome::Reserved)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let ledger = InMemoryCapacityLedger::new();
        let event = event_with_spots(&ledger, 10).await;

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .try_reserve(event.id, UserId::new(format!("user-{i}")))
                        .await
                })
            })
            .collect();

        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap() == Ok(ReserveOutcome::Reserved) {
                reserved += 1;
            }
        }

        assert_eq!(reserved, 10);
        assert_eq!(ledger.registered_count(event.id), Some(10));
        assert_eq!(ledger.active_registrations(event.id), 10);
    }
}
