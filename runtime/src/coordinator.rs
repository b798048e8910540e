//! Registration coordinator.
//!
//! Orchestrates a register or unregister request across the three collaborators:
//!
//! 1. **Ledger**: atomic capacity decision, retried on conflict. Rejections are
//!    returned to the caller and nothing else happens.
//! 2. **Interaction log**: best-effort append. A failure after retries is logged and
//!    counted as a soft inconsistency; the request still succeeds.
//! 3. **Channel**: settlement intent published with the event id as session key.
//!    A failure after retries surfaces as [`RegistrationError::ChannelUnavailable`]
//!    but the ledger change is kept.
//!
//! The coordinator holds no per-event state; concurrent requests for the same event
//! are serialized by the ledger alone.

use crate::ledger::RetryingLedger;
use crate::metrics::RegistrationMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use eventhub_core::channel::{ChannelError, OrderedChannel};
use eventhub_core::environment::Clock;
use eventhub_core::error::RegistrationError;
use eventhub_core::interaction_log::InteractionLog;
use eventhub_core::ledger::{CapacityLedger, LedgerError, ReleaseOutcome, ReserveOutcome};
use eventhub_core::types::{
    CorrelationId, EventId, InteractionRecord, RegistrationAction, SettlementIntent, UserId,
};
use std::sync::Arc;
use std::time::Duration;

/// Retry and timeout settings for the coordinator's collaborators.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Retries for ledger conflicts
    pub ledger_retry: RetryPolicy,
    /// Timeout for a single ledger attempt
    pub ledger_timeout: Duration,
    /// Retries for interaction log appends and purges
    pub log_retry: RetryPolicy,
    /// Retries for channel publishes
    pub publish_retry: RetryPolicy,
    /// Timeout for a single publish attempt
    pub publish_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ledger_retry: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(10))
                .max_delay(Duration::from_millis(200))
                .build(),
            ledger_timeout: Duration::from_secs(2),
            log_retry: RetryPolicy::builder()
                .max_retries(2)
                .initial_delay(Duration::from_millis(25))
                .max_delay(Duration::from_millis(250))
                .build(),
            publish_retry: RetryPolicy::builder()
                .max_retries(4)
                .initial_delay(Duration::from_millis(50))
                .max_delay(Duration::from_secs(2))
                .build(),
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Acknowledgement returned once a decision is committed and its intent published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// Event the decision applies to
    pub event_id: EventId,
    /// Requesting user
    pub user_id: UserId,
    /// What was decided
    pub action: RegistrationAction,
    /// Correlation id carried by the published intent
    pub correlation_id: CorrelationId,
}

/// Coordinates the ledger, interaction log and settlement channel.
#[derive(Clone)]
pub struct RegistrationCoordinator {
    ledger: Arc<dyn CapacityLedger>,
    log: Arc<dyn InteractionLog>,
    channel: Arc<dyn OrderedChannel>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
}

impl RegistrationCoordinator {
    /// Create a coordinator. The ledger is wrapped in a [`RetryingLedger`] built from
    /// `config.ledger_retry` and `config.ledger_timeout`.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn CapacityLedger>,
        log: Arc<dyn InteractionLog>,
        channel: Arc<dyn OrderedChannel>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let ledger: Arc<dyn CapacityLedger> = Arc::new(RetryingLedger::new(
            ledger,
            config.ledger_retry.clone(),
            config.ledger_timeout,
        ));
        Self {
            ledger,
            log,
            channel,
            clock,
            config,
        }
    }

    /// Take a spot on `event_id` for `user_id`.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`], [`RegistrationError::AlreadyRegistered`]
    ///   or [`RegistrationError::CapacityExceeded`] when the ledger rejects the request
    /// - [`RegistrationError::ConcurrencyConflict`] when ledger retries are exhausted
    ///   or an attempt timed out
    /// - [`RegistrationError::ChannelUnavailable`] when the spot was taken but the
    ///   intent could not be published
    /// - [`RegistrationError::Storage`] on ledger infrastructure failure
    #[tracing::instrument(skip_all, fields(event_id = %event_id, user_id = %user_id))]
    pub async fn register(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Accepted, RegistrationError> {
        let outcome = self
            .ledger
            .try_reserve(event_id, user_id.clone())
            .await
            .map_err(|e| {
                RegistrationMetrics::record_registration(outcome_label_for(&e));
                ledger_failure(e)
            })?;

        let rejection = match outcome {
            ReserveOutcome::Reserved => None,
            ReserveOutcome::EventNotFound => Some(RegistrationError::EventNotFound(event_id)),
            ReserveOutcome::AlreadyRegistered => {
                Some(RegistrationError::AlreadyRegistered(event_id))
            }
            ReserveOutcome::CapacityExceeded => Some(RegistrationError::CapacityExceeded(event_id)),
        };
        if let Some(err) = rejection {
            tracing::debug!(code = err.code(), "Registration rejected");
            RegistrationMetrics::record_registration(rejection_label(&err));
            return Err(err);
        }

        let result = self
            .settle(event_id, user_id, RegistrationAction::Register)
            .await;
        RegistrationMetrics::record_registration(match &result {
            Ok(_) => "accepted",
            Err(_) => "channel_unavailable",
        });
        result
    }

    /// Give back the spot held by `user_id` on `event_id`.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] or [`RegistrationError::NotRegistered`]
    ///   when the ledger rejects the request
    /// - otherwise the same failures as [`RegistrationCoordinator::register`]
    #[tracing::instrument(skip_all, fields(event_id = %event_id, user_id = %user_id))]
    pub async fn unregister(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Accepted, RegistrationError> {
        let outcome = self
            .ledger
            .release(event_id, user_id.clone())
            .await
            .map_err(|e| {
                RegistrationMetrics::record_unregistration(outcome_label_for(&e));
                ledger_failure(e)
            })?;

        let rejection = match outcome {
            ReleaseOutcome::Released => None,
            ReleaseOutcome::EventNotFound => Some(RegistrationError::EventNotFound(event_id)),
            ReleaseOutcome::NotRegistered => Some(RegistrationError::NotRegistered(event_id)),
        };
        if let Some(err) = rejection {
            tracing::debug!(code = err.code(), "Unregistration rejected");
            RegistrationMetrics::record_unregistration(rejection_label(&err));
            return Err(err);
        }

        let result = self
            .settle(event_id, user_id, RegistrationAction::Unregister)
            .await;
        RegistrationMetrics::record_unregistration(match &result {
            Ok(_) => "accepted",
            Err(_) => "channel_unavailable",
        });
        result
    }

    /// Delete an event: purge its interaction records, then remove it from the ledger.
    ///
    /// The log is purged first so a failure leaves the event in place and the call
    /// can be repeated.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] if the event does not exist
    /// - [`RegistrationError::Storage`] if the purge or the delete fails
    #[tracing::instrument(skip_all, fields(event_id = %event_id))]
    pub async fn delete_event(&self, event_id: EventId) -> Result<(), RegistrationError> {
        if self
            .ledger
            .get_event(event_id)
            .await
            .map_err(ledger_failure)?
            .is_none()
        {
            return Err(RegistrationError::EventNotFound(event_id));
        }

        let purged = retry_with_backoff(self.config.log_retry.clone(), || {
            self.log.purge_by_event(event_id)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Interaction log purge failed, event kept");
            RegistrationError::Storage(e.to_string())
        })?;

        if !self
            .ledger
            .delete_event(event_id)
            .await
            .map_err(ledger_failure)?
        {
            return Err(RegistrationError::EventNotFound(event_id));
        }

        tracing::info!(purged, "Event deleted");
        Ok(())
    }

    async fn settle(
        &self,
        event_id: EventId,
        user_id: UserId,
        action: RegistrationAction,
    ) -> Result<Accepted, RegistrationError> {
        let now = self.clock.now();

        self.record_interaction(InteractionRecord::new(event_id, user_id.clone(), action, now))
            .await;

        let intent = SettlementIntent {
            event_id,
            user_id: user_id.clone(),
            action,
            correlation_id: CorrelationId::new(),
            timestamp: now,
        };
        self.publish(&intent).await?;

        tracing::info!(
            correlation_id = %intent.correlation_id,
            action = %action,
            "Registration change accepted"
        );

        Ok(Accepted {
            event_id,
            user_id,
            action,
            correlation_id: intent.correlation_id,
        })
    }

    async fn record_interaction(&self, record: InteractionRecord) {
        let appended = retry_with_backoff(self.config.log_retry.clone(), || {
            self.log.append(record.clone())
        })
        .await;

        if let Err(e) = appended {
            RegistrationMetrics::record_soft_inconsistency();
            tracing::warn!(
                interaction_id = %record.id,
                action = %record.action,
                error = %e,
                "Interaction log append failed after ledger commit"
            );
        }
    }

    async fn publish(&self, intent: &SettlementIntent) -> Result<(), RegistrationError> {
        let publish_timeout = self.config.publish_timeout;

        let published = retry_with_backoff(self.config.publish_retry.clone(), || async move {
            match tokio::time::timeout(publish_timeout, self.channel.publish(intent)).await {
                Ok(result) => result,
                Err(_) => Err(ChannelError::Timeout(intent.session_key())),
            }
        })
        .await;

        published.map_err(|e| {
            RegistrationMetrics::record_publish_failure();
            tracing::error!(
                correlation_id = %intent.correlation_id,
                error = %e,
                "Settlement intent not published; ledger change kept"
            );
            RegistrationError::ChannelUnavailable
        })
    }
}

fn ledger_failure(error: LedgerError) -> RegistrationError {
    match error {
        LedgerError::Conflict(_) | LedgerError::Timeout => RegistrationError::ConcurrencyConflict,
        LedgerError::Invalid(msg) | LedgerError::Storage(msg) => RegistrationError::Storage(msg),
    }
}

const fn outcome_label_for(error: &LedgerError) -> &'static str {
    match error {
        LedgerError::Conflict(_) | LedgerError::Timeout => "concurrency_conflict",
        LedgerError::Invalid(_) | LedgerError::Storage(_) => "storage_error",
    }
}

const fn rejection_label(error: &RegistrationError) -> &'static str {
    match error {
        RegistrationError::EventNotFound(_) => "event_not_found",
        RegistrationError::NotRegistered(_) => "not_registered",
        RegistrationError::CapacityExceeded(_) => "capacity_exceeded",
        RegistrationError::AlreadyRegistered(_) => "already_registered",
        RegistrationError::ConcurrencyConflict => "concurrency_conflict",
        RegistrationError::ChannelUnavailable => "channel_unavailable",
        RegistrationError::Storage(_) => "storage_error",
    }
}
