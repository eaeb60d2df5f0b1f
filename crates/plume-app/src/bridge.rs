//! Turns settled calls into service events.

use plume_hooks::HookContext;
use serde_json::Value;
use tracing::debug;

use crate::emitter::ServiceEmitter;

/// Emit the event for a call that succeeded, `finally` hooks included.
///
/// Only `create`, `update`, `patch` and `remove` produce events. Nothing is
/// emitted when `ctx.event` was cleared (or set to an empty name) or when
/// the service lists the method's event among those it emits itself. An
/// array response produces one event per element.
///
/// Returns the number of events emitted.
pub fn emit_for_call(
    emitter: &ServiceEmitter,
    self_managed: &[String],
    ctx: &HookContext,
) -> usize {
    let Some(default_event) = ctx.method().event_name() else {
        return 0;
    };
    let Some(event) = ctx.event.as_deref().filter(|name| !name.is_empty()) else {
        debug!(path = %ctx.path(), method = %ctx.method(), "Event suppressed by hook");
        return 0;
    };
    if self_managed.iter().any(|e| e == default_event || e == event) {
        debug!(path = %ctx.path(), event = %event, "Event is emitted by the service itself");
        return 0;
    }
    let Some(payload) = ctx.response() else {
        return 0;
    };

    match payload {
        Value::Array(elements) => {
            for (element, element_ctx) in elements.iter().zip(ctx.for_elements(elements)) {
                emitter.emit(event, element, &element_ctx);
            }
            elements.len()
        }
        single => {
            emitter.emit(event, single, ctx);
            1
        }
    }
}
