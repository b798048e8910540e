//! Redpanda settlement channel for eventhub.
//!
//! Implements [`OrderedChannel`] on top of rdkafka. Every intent is keyed by its
//! event id, so all intents for one event land in one partition and are consumed in
//! publish order. Intents for different events may interleave freely.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery**:
//! - The producer runs with `enable.idempotence=true` and `acks=all`, so broker-side
//!   retries neither duplicate nor reorder messages within a partition
//! - Consumers commit offsets only AFTER handing the intent to the subscriber's
//!   channel; a crash before commit redelivers the intent
//! - The settlement consumer deduplicates on `correlationId`
//!
//! # Wire format
//!
//! Key: event id (UUID string). Payload: JSON
//! `{ eventId, userId, action: "Register"|"Unregister", correlationId, timestamp }`.
//! Header `correlation-id` repeats the correlation id for broker-side tooling.
//!
//! # Example
//!
//! ```no_run
//! use eventhub_redpanda::RedpandaChannel;
//! use eventhub_core::channel::OrderedChannel;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = RedpandaChannel::builder()
//!     .brokers("localhost:9092")
//!     .topic("event-registrations")
//!     .build()?;
//!
//! let mut intents = channel.subscribe().await?;
//! while let Some(result) = intents.next().await {
//!     match result {
//!         Ok(intent) => println!("{} {} {}", intent.action, intent.user_id, intent.event_id),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use eventhub_core::channel::{ChannelError, IntentStream, OrderedChannel};
use eventhub_core::types::SettlementIntent;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default topic for settlement intents.
pub const DEFAULT_TOPIC: &str = "event-registrations";

/// Redpanda-backed [`OrderedChannel`].
///
/// # Example
///
/// ```no_run
/// use eventhub_redpanda::RedpandaChannel;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let channel = RedpandaChannel::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .topic("event-registrations")
///     .producer_acks("all")
///     .compression("lz4")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaChannel {
    /// Kafka producer for publishing intents
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Topic carrying settlement intents
    topic: String,
    /// Producer timeout
    timeout: Duration,
    /// Consumer group ID (if explicitly set)
    consumer_group: Option<String>,
    /// Intent buffer size for subscribers
    buffer_size: usize,
    /// Auto offset reset policy
    auto_offset_reset: String,
}

impl RedpandaChannel {
    /// Create a channel on the default topic.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, ChannelError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the channel.
    #[must_use]
    pub fn builder() -> RedpandaChannelBuilder {
        RedpandaChannelBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// The topic intents are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Builder for configuring a [`RedpandaChannel`].
#[derive(Default)]
pub struct RedpandaChannelBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaChannelBuilder {
    /// Set the broker addresses.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic. Default: `event-registrations`.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// Default: "all". Idempotent production requires "all"; any other value turns
    /// idempotence off.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec.
    ///
    /// - `compression`: "none", "gzip", "snappy", "lz4", "zstd"
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group ID for subscriptions.
    ///
    /// If not set, defaults to `eventhub-settlement-<topic>`. Instances sharing a group
    /// split the partitions between them.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the intent buffer size for subscriptions (default: 1000, minimum 1).
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Set the auto offset reset policy for new consumer groups.
    ///
    /// - `"earliest"`: Start from the beginning of the topic
    /// - `"latest"`: Start from the end (only new intents)
    ///
    /// Default: "earliest", so a fresh settlement consumer sees every intent.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaChannel`].
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ConnectionFailed`] if brokers are not set or the
    /// producer cannot be created.
    pub fn build(self) -> Result<RedpandaChannel, ChannelError> {
        let brokers = self
            .brokers
            .ok_or_else(|| ChannelError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let acks = self.producer_acks.unwrap_or_else(|| "all".to_string());
        let compression = self.compression.unwrap_or_else(|| "none".to_string());
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let idempotent = acks == "all" || acks == "-1";

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", &acks)
            .set("enable.idempotence", idempotent.to_string())
            .set("max.in.flight.requests.per.connection", "5")
            .set("compression.type", &compression);

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            ChannelError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        let buffer_size = self.buffer_size.unwrap_or(1000);
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "earliest".to_string());

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            acks = %acks,
            idempotent,
            compression = %compression,
            buffer_size,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaChannel created"
        );

        Ok(RedpandaChannel {
            producer,
            brokers,
            topic,
            timeout,
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset,
        })
    }
}

impl OrderedChannel for RedpandaChannel {
    fn publish(
        &self,
        intent: &SettlementIntent,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>> {
        let intent = intent.clone();

        Box::pin(async move {
            let session_key = intent.session_key();
            let payload = intent.to_json().map_err(|e| ChannelError::PublishFailed {
                session_key: session_key.clone(),
                reason: format!("Failed to serialize intent: {e}"),
            })?;
            let correlation_id = intent.correlation_id.to_string();

            let record = FutureRecord::to(&self.topic)
                .payload(&payload)
                .key(&session_key)
                .headers(OwnedHeaders::new().insert(Header {
                    key: "correlation-id",
                    value: Some(correlation_id.as_str()),
                }));

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %self.topic,
                        partition,
                        offset,
                        session_key = %session_key,
                        correlation_id = %correlation_id,
                        "Intent published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::warn!(
                        topic = %self.topic,
                        session_key = %session_key,
                        error = %kafka_error,
                        "Failed to publish intent"
                    );
                    Err(ChannelError::PublishFailed {
                        session_key,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    #[allow(clippy::too_many_lines)] // At-least-once delivery with manual commits
    fn subscribe(&self) -> Pin<Box<dyn Future<Output = Result<IntentStream, ChannelError>> + Send + '_>> {
        let topic = self.topic.clone();
        let brokers = self.brokers.clone();
        let consumer_group = self
            .consumer_group
            .clone()
            .unwrap_or_else(|| format!("eventhub-settlement-{topic}"));
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| {
                    ChannelError::SubscriptionFailed(format!("Failed to create consumer: {e}"))
                })?;

            consumer.subscribe(&[topic.as_str()]).map_err(|e| {
                ChannelError::SubscriptionFailed(format!("Failed to subscribe to {topic}: {e}"))
            })?;

            tracing::info!(
                topic = %topic,
                consumer_group = %consumer_group,
                buffer_size,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to settlement intents"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The task owns the consumer and forwards intents
            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    match msg_result {
                        Ok(message) => {
                            let intent_result = match message.payload() {
                                Some(payload) => SettlementIntent::from_json(payload).map_err(|e| {
                                    ChannelError::DeserializationFailed(format!(
                                        "Failed to deserialize intent: {e}"
                                    ))
                                }),
                                None => Err(ChannelError::DeserializationFailed(
                                    "Message has no payload".to_string(),
                                )),
                            };

                            if let Ok(intent) = &intent_result {
                                tracing::trace!(
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    correlation_id = %intent.correlation_id,
                                    "Received intent"
                                );
                            }

                            // Only commit AFTER handing the intent over
                            if tx.send(intent_result).await.is_err() {
                                tracing::debug!("Subscriber dropped, exiting consumer task");
                                break;
                            }

                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Failed to commit offset (intent may be redelivered)"
                                );
                            }
                        }
                        Err(e) => {
                            let err = ChannelError::TransportError(format!(
                                "Failed to receive message: {e}"
                            ));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as IntentStream)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn redpanda_channel_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaChannel>();
        assert_sync::<RedpandaChannel>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaChannel::builder().topic("t").build();
        assert!(matches!(result, Err(ChannelError::ConnectionFailed(_))));
    }

    #[test]
    fn builder_applies_defaults() {
        // librdkafka creates producers lazily; no broker is contacted here
        let channel = RedpandaChannel::builder()
            .brokers("localhost:9092")
            .buffer_size(0)
            .build()
            .unwrap();

        assert_eq!(channel.topic(), DEFAULT_TOPIC);
        assert_eq!(channel.brokers(), "localhost:9092");
        assert_eq!(channel.buffer_size, 1);
        assert_eq!(channel.auto_offset_reset, "earliest");
    }
}
