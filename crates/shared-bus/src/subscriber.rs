//! Receiving side of the bus.

use crate::events::{EventFilter, TransportEvent};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event bus closed")]
    Closed,
}

fn report_lag(skipped: u64, total: u64) {
    warn!(skipped, total, "Subscriber fell behind the event bus");
}

/// Filtered receiver. Events skipped because this subscriber fell behind
/// are counted in [`Subscription::missed`].
pub struct Subscription {
    receiver: Receiver<TransportEvent>,
    filter: EventFilter,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: Receiver<TransportEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            missed: 0,
        }
    }

    /// Next matching event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Result<Option<TransportEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed += skipped;
        report_lag(skipped, self.missed);
    }
}

/// [`Subscription`] as a `Stream`.
pub struct EventStream {
    inner: BroadcastStream<TransportEvent>,
    filter: EventFilter,
    missed: u64,
}

impl EventStream {
    pub(crate) fn new(receiver: Receiver<TransportEvent>, filter: EventFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            missed: 0,
        }
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = TransportEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let event = match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => event,
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    self.missed += skipped;
                    report_lag(skipped, self.missed);
                    continue;
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            };
            if self.filter.matches(&event) {
                return Poll::Ready(Some(event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use shared_types::{BlockVotes, SignatureShare};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    fn share(broadcast: bool) -> TransportEvent {
        TransportEvent::Signature {
            signature: SignatureShare {
                transaction: "t1".into(),
                signature: "00".into(),
            },
            broadcast,
        }
    }

    fn votes(height: u64) -> TransportEvent {
        TransportEvent::ReceiveVotes(BlockVotes {
            height,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_topic_filter_skips_other_events() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Signatures]));

        bus.publish(votes(1)).await;
        bus.publish(share(false)).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert!(matches!(received, TransportEvent::Signature { .. }));
    }

    #[tokio::test]
    async fn test_try_recv_empty_then_ready() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::outbound());
        assert!(matches!(sub.try_recv(), Ok(None)));

        bus.publish(share(false)).await;
        bus.publish(share(true)).await;
        assert!(matches!(
            sub.try_recv(),
            Ok(Some(TransportEvent::Signature { broadcast: true, .. }))
        ));
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        drop(bus);
        assert!(sub.recv().await.is_none());
        assert!(matches!(sub.try_recv(), Err(SubscriptionError::Closed)));
    }

    #[tokio::test]
    async fn test_slow_subscriber_counts_missed_events() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());
        for height in 1..=5 {
            bus.publish(votes(height)).await;
        }

        let first = sub.recv().await.expect("event");
        assert!(matches!(first, TransportEvent::ReceiveVotes(v) if v.height == 4));
        assert_eq!(sub.missed(), 3);
    }

    #[tokio::test]
    async fn test_stream_yields_only_flagged_events() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::outbound());

        bus.publish(share(false)).await;
        bus.publish(share(true)).await;

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("event");
        assert!(next.wants_broadcast());
        assert_eq!(stream.missed(), 0);
    }
}
