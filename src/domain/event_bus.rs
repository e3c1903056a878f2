//! Broadcast channel for inbound upstream messages.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The upstream
//! broker publishes every [`PatternMessage`] it delivers through the bus,
//! and the dispatch loop in [`crate::service::PubSubService`] drains it into
//! [`super::SubscriptionRegistry::dispatch`].

use tokio::sync::broadcast;

use super::PatternMessage;

/// Broadcast bus for [`PatternMessage`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest messages are
/// dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PatternMessage>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a message to all receivers.
    ///
    /// Returns the number of receivers that received the message.
    /// If there are no active receivers, the message is silently dropped.
    pub fn publish(&self, message: PatternMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PatternMessage> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::domain::Pattern;

    fn make_message(channel: &str) -> PatternMessage {
        let Ok(pattern) = Pattern::new("client:*") else {
            panic!("valid pattern");
        };
        PatternMessage::new(pattern, channel, Bytes::from_static(b"payload"))
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(make_message("client:1")), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_message() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.publish(make_message("client:1"));

        let Ok(msg) = rx.recv().await else {
            panic!("expected to receive message");
        };
        assert_eq!(msg.channel, "client:1");
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
