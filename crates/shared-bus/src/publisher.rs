//! Publishing side of the bus.

use crate::events::{EventFilter, TransportEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Where the transport sends inbound gossip.
///
/// Held as `Arc<dyn EventPublisher>`, so tests can record instead of fan out.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand `event` to every live subscription; returns how many got it.
    async fn publish(&self, event: TransportEvent) -> usize;

    /// Events handed to `publish` so far, delivered or not.
    fn events_published(&self) -> u64;
}

/// Bus backed by a `tokio::sync::broadcast` channel.
///
/// A subscription that falls more than the channel capacity behind skips the
/// oldest events and counts them as missed.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<TransportEvent>,
    published: AtomicU64,
    undelivered: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A bus buffering up to `capacity` events per subscription.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: AtomicU64::new(0),
            undelivered: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(?filter, "Event bus subscription");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Same as [`Self::subscribe`], as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published while nobody was subscribed.
    #[must_use]
    pub fn undelivered(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: TransportEvent) -> usize {
        let topic = event.topic();
        self.published.fetch_add(1, Ordering::Relaxed);

        let Ok(receivers) = self.sender.send(event) else {
            self.undelivered.fetch_add(1, Ordering::Relaxed);
            debug!(?topic, "No subscriber for event");
            return 0;
        };
        trace!(?topic, receivers, "Event published");
        receivers
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
