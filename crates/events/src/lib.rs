//! Shared event contracts between the gesture pipeline and the transport.
//!
//! This crate defines the wire DTOs and event names that flow to clients.
//! Using shared types keeps the pipeline and the transport from drifting on
//! field names.
//!
//! Also provides the `EventEmitter` trait for decoupled event emission.

mod bus;

pub use bus::{EmittedEvent, EventEmitter, EventEmitterRef, InMemoryEmitter};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque per-connection identifier assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for a new connection.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Who receives an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventTarget {
    /// The originating session only.
    Session(SessionId),
    /// Every connected session.
    Broadcast,
}

impl EventTarget {
    pub fn includes(&self, session: &SessionId) -> bool {
        match self {
            Self::Session(id) => id == session,
            Self::Broadcast => true,
        }
    }
}

/// Process-wide microphone state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MicStatus {
    #[default]
    On,
    Off,
}

impl MicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for MicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `mic-status`, both as a broadcast and as a status query reply.
///
/// Producers: gesture pipeline (mic latch), status query
/// Consumers: every client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicStatusEvent {
    pub status: MicStatus,
}

/// Outbound wire envelope: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Inbound video frame.
    pub const FRAME: &str = "frame";
    /// Inbound status query.
    pub const STATUS: &str = "status";

    /// OK sign gesture.
    pub const OK_SIGN_DETECTED: &str = "ok-sign-detected";
    /// Pinky raised.
    pub const PINKY_REACTION: &str = "pinky-reaction";
    /// Open palm, client takes a screenshot.
    pub const TAKE_SCREENSHOT: &str = "take-screenshot";
    /// Thumbs up, client starts recording.
    pub const START_RECORDING: &str = "start-recording";
    /// Thumbs down, client stops recording.
    pub const STOP_RECORDING: &str = "stop-recording";
    /// Mic latch changed (broadcast) or status query reply.
    pub const MIC_STATUS: &str = "mic-status";
}
