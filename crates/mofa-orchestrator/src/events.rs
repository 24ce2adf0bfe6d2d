//! Type-tagged synchronous publish/subscribe event bus.
//!
//! Unlike `mofa_kernel::bus` (an async, tokio-broadcast-backed message bus
//! for agent-to-agent traffic), this bus is a plain in-process dispatcher:
//! `emit` calls handlers synchronously, in registration order, and never
//! lets a handler's panic or error take down the emitting call site.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    PlanStart,
    PlanEnd,
    ThinkChunk,
    LlmStreamChunk,
    ActionStart,
    ActionEnd,
    ExecResult,
    Observation,
    Content,
    TaskPhase,
    StepStart,
    StepEnd,
    Error,
    MaterialStart,
    MaterialEnd,
    Geometry3d,
    CouplingAdded,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
    pub timestamp: f64,
    pub iteration: Option<u64>,
}

impl Event {
    pub fn new(event_type: EventType, data: Value, iteration: Option<u64>) -> Self {
        Self {
            event_type,
            data,
            timestamp: current_timestamp(),
            iteration,
        }
    }
}

fn current_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// An event handler. Mirrors `mofa_foundation::messaging::OutboundCallback`'s
/// shape but stays synchronous — handlers here are expected to be cheap
/// (loggers, bridge writers, UI renderers), not suspension points.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default, Clone)]
pub struct EventBus {
    inner: Arc<RwLock<EventBusInner>>,
}

#[derive(Default)]
struct EventBusInner {
    handlers: HashMap<EventType, Vec<Handler>>,
    global_handlers: Vec<Handler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event_type: EventType, handler: Handler) {
        self.inner
            .write()
            .expect("event bus lock poisoned")
            .handlers
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    pub fn subscribe_all(&self, handler: Handler) {
        self.inner
            .write()
            .expect("event bus lock poisoned")
            .global_handlers
            .push(handler);
    }

    /// Calls every global handler, then every handler registered for
    /// `event.event_type`, in registration order. Dispatch reads a snapshot
    /// of the handler lists taken under the lock, then releases it before
    /// calling out, so handlers may themselves subscribe without deadlocking.
    pub fn emit(&self, event: Event) {
        let (globals, typed) = {
            let guard = self.inner.read().expect("event bus lock poisoned");
            let globals = guard.global_handlers.clone();
            let typed = guard
                .handlers
                .get(&event.event_type)
                .cloned()
                .unwrap_or_default();
            (globals, typed)
        };

        for handler in globals.iter().chain(typed.iter()) {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::warn!(event_type = %event.event_type, %message, "event handler panicked; ignoring");
            }
        }
    }

    pub fn emit_type(&self, event_type: EventType, data: Value, iteration: Option<u64>) {
        self.emit(Event::new(event_type, data, iteration));
    }
}
