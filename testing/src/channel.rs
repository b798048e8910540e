//! In-memory ordered channel.
//!
//! Records every accepted intent in publish order and fans it out to subscribers.
//! Ordering per session key follows from the single append-ordered buffer.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use eventhub_core::channel::{ChannelError, IntentStream, OrderedChannel};
use eventhub_core::types::{EventId, SettlementIntent};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

const SUBSCRIBER_BUFFER: usize = 1024;

/// [`OrderedChannel`] backed by a `Vec` and a broadcast channel.
#[derive(Clone, Debug)]
pub struct InMemoryChannel {
    published: Arc<RwLock<Vec<SettlementIntent>>>,
    sender: broadcast::Sender<SettlementIntent>,
    failing_publishes: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            published: Arc::new(RwLock::new(Vec::new())),
            sender,
            failing_publishes: Arc::new(AtomicUsize::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
            latency: Arc::new(RwLock::new(None)),
        }
    }

    /// Make the next `count` publishes fail.
    pub fn fail_next_publishes(&self, count: usize) {
        self.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// Reject every publish until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every publish before it is accepted.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write().unwrap() = Some(latency);
    }

    /// Every accepted intent, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<SettlementIntent> {
        self.published.read().unwrap().clone()
    }

    /// Accepted intents for one session key, in publish order.
    #[must_use]
    pub fn published_for(&self, event_id: EventId) -> Vec<SettlementIntent> {
        self.published
            .read()
            .unwrap()
            .iter()
            .filter(|intent| intent.event_id == event_id)
            .cloned()
            .collect()
    }
}

impl OrderedChannel for InMemoryChannel {
    fn publish(
        &self,
        intent: &SettlementIntent,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>> {
        let intent = intent.clone();
        Box::pin(async move {
            let latency = *self.latency.read().unwrap();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let rejected = self.unavailable.load(Ordering::SeqCst)
                || self
                    .failing_publishes
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            if rejected {
                return Err(ChannelError::PublishFailed {
                    session_key: intent.session_key(),
                    reason: "broker unavailable".to_string(),
                });
            }

            self.published.write().unwrap().push(intent.clone());
            // No subscribers is not an error
            let _ = self.sender.send(intent);
            Ok(())
        })
    }

    fn subscribe(&self) -> Pin<Box<dyn Future<Output = Result<IntentStream, ChannelError>> + Send + '_>> {
        let mut receiver = self.sender.subscribe();
        Box::pin(async move {
            let stream = async_stream::stream! {
                loop {
                    match receiver.recv().await {
                        Ok(intent) => yield Ok(intent),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            yield Err(ChannelError::TransportError(format!(
                                "subscriber lagged, {skipped} intents skipped"
                            )));
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(stream) as IntentStream)
        })
    }
}
