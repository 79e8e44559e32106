use tokio::sync::broadcast;
use tracing::trace;

use super::{EventPublisher, ReviewEvent};

/// Default capacity of the broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out publisher over a tokio broadcast channel.
///
/// Slow subscribers lag and lose old events instead of back-pressuring the
/// orchestrator. With no subscribers, events are dropped.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ReviewEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventPublisher for BroadcastNotifier {
    fn publish(&self, event: ReviewEvent) {
        trace!(event_type = event.event_type(), feature_id = event.feature_id(), "publish");
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

/// Publisher that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: ReviewEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = BroadcastNotifier::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ReviewEvent::Started {
            feature_id: 1,
            iteration: 1,
        });
        bus.publish(ReviewEvent::progress(1, 1, "commit", "abc"));

        assert_eq!(rx.recv().await.unwrap().event_type(), "started");
        assert_eq!(rx.recv().await.unwrap().event_type(), "progress");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = BroadcastNotifier::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(ReviewEvent::Failed {
            feature_id: 1,
            iteration: 1,
            reason: "x".into(),
        });
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_block_publisher() {
        let bus = BroadcastNotifier::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.publish(ReviewEvent::Started {
                feature_id: 1,
                iteration: i,
            });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
