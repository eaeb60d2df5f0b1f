//! Event types published when services change data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::id::Id;
use crate::method::ServiceMethod;

/// An event emitted by a service, as seen on the application event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEvent {
    /// Service path without leading or trailing slashes.
    pub path: String,
    /// Event name (`created`, `patched`, or a custom event of the service).
    pub event: String,
    /// Method whose completion produced the event, `None` for custom events.
    pub method: Option<ServiceMethod>,
    /// Id the call was made with, if any.
    pub id: Option<Id>,
    /// The dispatch-safe payload.
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ServiceEvent {
    pub fn new(
        path: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            path: path.into(),
            event: event.into(),
            method: None,
            id: None,
            payload,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_method(mut self, method: ServiceMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_id(mut self, id: Option<Id>) -> Self {
        self.id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_event_builder() {
        let event = ServiceEvent::new("messages", "removed", json!({"id": 22}))
            .with_method(ServiceMethod::Remove)
            .with_id(Some(Id::from(22)));

        assert_eq!(event.path, "messages");
        assert_eq!(event.method, Some(ServiceMethod::Remove));
        assert_eq!(event.id, Some(Id::from(22)));
    }

    #[test]
    fn test_custom_event_has_no_method() {
        let event = ServiceEvent::new("messages", "typing", json!({}));
        assert_eq!(event.method, None);
        assert_eq!(event.id, None);
    }

    #[test]
    fn test_event_serialization() {
        let event = ServiceEvent::new("messages", "created", json!({"text": "hi"}))
            .with_method(ServiceMethod::Create);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["method"], "create");
        assert_eq!(value["event"], "created");
        assert!(value["timestamp"].is_string());
    }
}
