//! Per-service event emitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use plume_core::{EventBroadcaster, ServiceEvent};
use plume_hooks::HookContext;
use serde_json::Value;
use tracing::debug;

/// Handle returned by [`ServiceEmitter::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event listener. The context is present for events emitted after a call
/// and absent for custom events a service emits itself.
pub type Listener = Arc<dyn Fn(&Value, Option<&HookContext>) + Send + Sync>;

/// Event emission capability owned by each hooked service.
///
/// Listeners run synchronously in registration order. Every event is also
/// published on the application broadcaster once one is attached.
pub struct ServiceEmitter {
    path: String,
    listeners: DashMap<String, Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    broadcaster: OnceLock<Arc<EventBroadcaster>>,
}

impl ServiceEmitter {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            broadcaster: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Publish every event on `broadcaster` as well. Only the first attached
    /// broadcaster is kept.
    pub fn attach_broadcaster(&self, broadcaster: Arc<EventBroadcaster>) -> bool {
        self.broadcaster.set(broadcaster).is_ok()
    }

    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Value, Option<&HookContext>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        self.listeners
            .entry(event.into())
            .or_default()
            .push((id, listener));
        id
    }

    /// Returns `false` if no such listener was registered for `event`.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let Some(mut listeners) = self.listeners.get_mut(event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, |l| l.len())
    }

    /// Emit an event produced by a service call.
    pub fn emit(&self, event: &str, payload: &Value, ctx: &HookContext) -> usize {
        let delivered = self.notify(event, payload, Some(ctx));
        if let Some(broadcaster) = self.broadcaster.get() {
            broadcaster.send(
                ServiceEvent::new(&self.path, event, payload.clone())
                    .with_method(ctx.method())
                    .with_id(ctx.id().cloned()),
            );
        }
        delivered
    }

    /// Emit an event with no call attached, such as a service's own custom
    /// event.
    pub fn emit_custom(&self, event: &str, payload: Value) -> usize {
        let delivered = self.notify(event, &payload, None);
        if let Some(broadcaster) = self.broadcaster.get() {
            broadcaster.send(ServiceEvent::new(&self.path, event, payload));
        }
        delivered
    }

    fn notify(&self, event: &str, payload: &Value, ctx: Option<&HookContext>) -> usize {
        // Listeners may register further listeners, so none is called while
        // the map entry is locked.
        let listeners: Vec<Listener> = match self.listeners.get(event) {
            Some(entry) => entry.iter().map(|(_, l)| l.clone()).collect(),
            None => Vec::new(),
        };
        for listener in &listeners {
            listener(payload, ctx);
        }
        debug!(
            path = %self.path,
            event = %event,
            listeners = listeners.len(),
            "Emitted service event"
        );
        listeners.len()
    }
}

impl std::fmt::Debug for ServiceEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEmitter")
            .field("path", &self.path)
            .field("events", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
