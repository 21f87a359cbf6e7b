//! Event emitter abstraction for decoupled event delivery.
//!
//! Provides a trait-based abstraction over event emission, allowing the gesture
//! pipeline to be tested without a transport.

use std::sync::{Arc, Mutex};

use crate::{EventTarget, SessionId};

/// Trait for delivering named events to sessions.
///
/// Emission is fire-and-forget: implementations must not block the caller and
/// the caller treats every emission as delivered. Delivery failures are the
/// implementation's concern.
pub trait EventEmitter: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// # Arguments
    /// * `target` - The originating session or every session
    /// * `event` - Event name (e.g., "ok-sign-detected")
    /// * `payload` - JSON payload to emit
    fn emit(&self, target: &EventTarget, event: &str, payload: serde_json::Value);
}

/// Type alias for shared emitter reference.
pub type EventEmitterRef = Arc<dyn EventEmitter>;

/// In-memory emitter for testing.
///
/// Captures all emitted events for later inspection.
#[derive(Default)]
pub struct InMemoryEmitter {
    events: Mutex<Vec<EmittedEvent>>,
}

/// A captured event from InMemoryEmitter.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub target: EventTarget,
    pub event: String,
    pub payload: serde_json::Value,
}

impl InMemoryEmitter {
    /// Create a new in-memory emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Get events with a specific name.
    pub fn events_named(&self, event: &str) -> Vec<EmittedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event == event)
            .cloned()
            .collect()
    }

    /// Get events a given session would have received.
    pub fn delivered_to(&self, session: &SessionId) -> Vec<EmittedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.target.includes(session))
            .cloned()
            .collect()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Get the number of captured events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Check if no events have been captured.
    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl EventEmitter for InMemoryEmitter {
    fn emit(&self, target: &EventTarget, event: &str, payload: serde_json::Value) {
        self.events.lock().unwrap().push(EmittedEvent {
            target: target.clone(),
            event: event.to_string(),
            payload,
        });
    }
}
