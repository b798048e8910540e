//! Ordered channel abstraction for settlement intents.
//!
//! The coordinator publishes a [`SettlementIntent`] after every accepted ledger
//! decision and returns to the caller without waiting for the settlement consumer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   Coordinator    │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ 1. Ledger commit │◄─── Source of truth
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ 2. Publish       │◄─── At-least-once, FIFO per event id
//! │    intent        │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Settlement     │◄─── Idempotent per correlation id
//! │   consumer       │
//! └──────────────────┘
//! ```
//!
//! # Delivery contract
//!
//! - **At-least-once**: an intent may be delivered more than once; consumers
//!   deduplicate on `correlation_id`.
//! - **Ordered per session**: intents with the same session key (the event id) are
//!   delivered in publish order. Intents for different events have no relative order.
//! - **Local acknowledgement**: `publish` resolves once the broker has accepted the
//!   message, not once it has been consumed.
//!
//! # Implementations
//!
//! - `InMemoryChannel` (in `eventhub-testing`): tests, with failure injection
//! - `RedpandaChannel` (in `eventhub-redpanda`): production (Kafka protocol)

use crate::types::SettlementIntent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during channel operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker did not accept the message
    #[error("Publish failed for session '{session_key}': {reason}")]
    PublishFailed {
        /// Session key of the rejected message
        session_key: String,
        /// The reason for failure
        reason: String,
    },

    /// The broker did not acknowledge within the publish timeout
    #[error("Publish timed out for session '{0}'")]
    Timeout(String),

    /// Failed to subscribe
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    /// A delivered message was not a valid intent
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error while consuming
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of delivered intents.
pub type IntentStream = Pin<Box<dyn Stream<Item = Result<SettlementIntent, ChannelError>> + Send>>;

/// Message broker with per-session FIFO ordering and at-least-once delivery.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the coordinator can hold an
/// `Arc<dyn OrderedChannel>`.
pub trait OrderedChannel: Send + Sync {
    /// Publish an intent using its event id as the session key.
    ///
    /// A single attempt; the caller owns retries.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::PublishFailed`] or [`ChannelError::Timeout`] if the
    /// broker did not accept the message.
    fn publish(
        &self,
        intent: &SettlementIntent,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>>;

    /// Subscribe to delivered intents (consumer side).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::SubscriptionFailed`] if the subscription cannot be set up.
    fn subscribe(&self) -> Pin<Box<dyn Future<Output = Result<IntentStream, ChannelError>> + Send + '_>>;
}
