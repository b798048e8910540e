//! Interaction log abstraction.
//!
//! Append-only record of register/unregister actions kept in a secondary,
//! eventually consistent store. It serves analytics reads and is never consulted
//! for capacity decisions: callers must not expect its counts to equal the
//! ledger's `registered_count`.

use crate::types::{EventId, EventRegistrationCount, InteractionRecord};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from interaction log operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InteractionLogError {
    /// The store could not be reached or rejected the write.
    #[error("Interaction log unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("Corrupt interaction record: {0}")]
    Corrupt(String),
}

/// Append-only store of interaction records.
pub trait InteractionLog: Send + Sync {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionLogError::Unavailable`] if the write fails.
    fn append(
        &self,
        record: InteractionRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), InteractionLogError>> + Send + '_>>;

    /// All records for an event, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or a record cannot be decoded.
    fn query_by_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<InteractionRecord>, InteractionLogError>> + Send + '_>>;

    /// Events ranked by net registrations (register minus unregister), descending.
    ///
    /// Only events with a positive net count are returned; ties are broken by
    /// event id so the ranking is deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn query_most_registered(
        &self,
        top_n: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<EventRegistrationCount>, InteractionLogError>> + Send + '_>>;

    /// Delete every record of an event. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionLogError::Unavailable`] if the delete fails.
    fn purge_by_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<u64, InteractionLogError>> + Send + '_>>;
}

/// Rank net registration counts the way every log implementation must.
///
/// Shared by implementations that aggregate in memory.
#[must_use]
pub fn rank_most_registered(
    records: &[InteractionRecord],
    top_n: usize,
) -> Vec<EventRegistrationCount> {
    use crate::types::RegistrationAction;
    use std::collections::HashMap;

    let mut totals: HashMap<EventId, i64> = HashMap::new();
    for record in records {
        let delta = match record.action {
            RegistrationAction::Register => 1,
            RegistrationAction::Unregister => -1,
        };
        *totals.entry(record.event_id).or_insert(0) += delta;
    }

    let mut ranked: Vec<EventRegistrationCount> = totals
        .into_iter()
        .filter_map(|(event_id, net)| {
            u64::try_from(net)
                .ok()
                .filter(|n| *n > 0)
                .map(|registrations| EventRegistrationCount {
                    event_id,
                    registrations,
                })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.registrations
            .cmp(&a.registrations)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
    ranked.truncate(top_n);
    ranked
}
