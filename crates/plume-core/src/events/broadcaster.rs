//! Event broadcaster for service events.
//!
//! The `EventBroadcaster` is the application-wide bus that republishes every
//! service event. It uses tokio's broadcast channel for multi-producer,
//! multi-consumer messaging.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

use super::types::ServiceEvent;

/// Default buffer size for the broadcast channel.
/// Events beyond this limit will cause older events to be dropped for slow receivers.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Broadcaster for service events.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ServiceEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new broadcaster with custom buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new broadcaster wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event,
    /// 0 if there are no active subscribers.
    pub fn send(&self, event: ServiceEvent) -> usize {
        let count = self.sender.send(event).unwrap_or_default();
        trace!(subscribers = count, "Broadcast service event");
        count
    }

    /// Subscribe to events.
    ///
    /// Events sent before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers.
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_broadcaster_creation() {
        let broadcaster = EventBroadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert!(!broadcaster.has_subscribers());
    }

    #[test]
    fn test_broadcaster_no_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let count = broadcaster.send(ServiceEvent::new("messages", "created", json!({})));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_broadcaster_send_receive() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        broadcaster.send(ServiceEvent::new("messages", "created", json!({"id": 1})));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.path, "messages");
        assert_eq!(event.event, "created");
        assert_eq!(event.payload, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_broadcaster_multiple_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver1 = broadcaster.subscribe();
        let mut receiver2 = broadcaster.subscribe();

        let count = broadcaster.send(ServiceEvent::new("messages", "patched", json!({})));
        assert_eq!(count, 2);

        assert_eq!(receiver1.recv().await.unwrap().event, "patched");
        assert_eq!(receiver2.recv().await.unwrap().event, "patched");
    }

    #[test]
    fn test_broadcaster_shared() {
        let broadcaster = EventBroadcaster::new_shared();
        let broadcaster2 = broadcaster.clone();

        let _receiver = broadcaster.subscribe();
        assert_eq!(broadcaster2.subscriber_count(), 1);
    }
}
