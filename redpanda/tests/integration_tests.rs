//! Integration tests for [`RedpandaChannel`] against a real Kafka-compatible broker.
//!
//! Marked `#[ignore]` because they need Docker and take 15-60 seconds to start the
//! broker. Run explicitly:
//!
//! ```bash
//! cargo test -p eventhub-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chrono::Utc;
use eventhub_core::channel::OrderedChannel;
use eventhub_core::types::{CorrelationId, EventId, RegistrationAction, SettlementIntent, UserId};
use eventhub_redpanda::RedpandaChannel;
use futures::StreamExt;
use std::time::Duration;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

fn intent(event_id: EventId, user: &str, action: RegistrationAction) -> SettlementIntent {
    SettlementIntent {
        event_id,
        user_id: UserId::new(user),
        action,
        correlation_id: CorrelationId::new(),
        timestamp: Utc::now(),
    }
}

/// Publish a warmup intent until the broker accepts it, which also auto-creates the topic.
async fn wait_for_topic(channel: &RedpandaChannel) -> EventId {
    let warmup_event = EventId::new();
    let warmup = intent(warmup_event, "warmup", RegistrationAction::Register);
    for attempt in 1..=60 {
        if channel.publish(&warmup).await.is_ok() {
            tokio::time::sleep(Duration::from_secs(3)).await;
            return warmup_event;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(attempt != 60, "Broker failed to become ready");
    }
    warmup_event
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_intents_for_one_event_arrive_in_publish_order() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");

    let channel = RedpandaChannel::builder()
        .brokers(&brokers)
        .topic("registrations-it")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create channel");

    let warmup_event = wait_for_topic(&channel).await;

    let mut stream = channel.subscribe().await.expect("Failed to subscribe");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let event_id = EventId::new();
    let sent = vec![
        intent(event_id, "alice", RegistrationAction::Register),
        intent(event_id, "bob", RegistrationAction::Register),
        intent(event_id, "alice", RegistrationAction::Unregister),
    ];
    for intent in &sent {
        channel.publish(intent).await.expect("Failed to publish");
    }

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(15), async {
        while received.len() < sent.len() {
            if let Some(result) = stream.next().await {
                let delivered = result.expect("Failed to receive intent");
                if delivered.event_id != warmup_event {
                    received.push(delivered);
                }
            }
        }
    })
    .await
    .expect("Timeout waiting for intents");

    assert_eq!(received, sent);
}
