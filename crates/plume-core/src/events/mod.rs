//! Service event types and the application-wide event bus.
//!
//! Every wrapped service emits `created`/`updated`/`patched`/`removed`
//! events after successful mutations. Besides the per-service listeners,
//! the events are republished on an [`EventBroadcaster`] so real-time
//! transports can subscribe to all services at once.
//!
//! # Example
//!
//! ```
//! use plume_core::events::{EventBroadcaster, ServiceEvent};
//!
//! let broadcaster = EventBroadcaster::new();
//! let _receiver = broadcaster.subscribe();
//!
//! broadcaster.send(ServiceEvent::new("messages", "created", serde_json::json!({"text": "hi"})));
//!
//! // In another task:
//! // let event = _receiver.recv().await.unwrap();
//! ```

pub mod broadcaster;
pub mod types;

pub use broadcaster::EventBroadcaster;
pub use types::ServiceEvent;
