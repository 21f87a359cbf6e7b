//! Connected sessions and their outbound channels.
//!
//! The registry is the server's [`EventEmitter`]: the pipeline emits into it
//! and each connection's writer task drains its own channel onto the socket.

use std::collections::HashMap;
use std::sync::RwLock;

use gestura_events::{Envelope, EventEmitter, EventTarget, SessionId};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, mpsc::UnboundedSender<String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and get the receiving end of its outbound channel.
    pub fn register(&self, session: SessionId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session, tx);
        }
        rx
    }

    /// Drop a session's channel. Its writer task ends once the channel drains.
    pub fn unregister(&self, session: &SessionId) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(session);
        }
    }

    pub fn contains(&self, session: &SessionId) -> bool {
        self.sessions
            .read()
            .map(|s| s.contains_key(session))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn encode(event: &str, payload: serde_json::Value) -> Option<String> {
        match serde_json::to_string(&Envelope::new(event, payload)) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(event, error = %e, "Failed to encode event");
                None
            }
        }
    }
}

impl EventEmitter for SessionRegistry {
    fn emit(&self, target: &EventTarget, event: &str, payload: serde_json::Value) {
        let Some(text) = Self::encode(event, payload) else {
            return;
        };
        let Ok(sessions) = self.sessions.read() else {
            return;
        };

        match target {
            EventTarget::Session(session) => match sessions.get(session) {
                Some(tx) => {
                    if tx.send(text).is_err() {
                        tracing::debug!(%session, event, "Session writer gone");
                    }
                }
                None => tracing::debug!(%session, event, "Event for unknown session"),
            },
            EventTarget::Broadcast => {
                for (session, tx) in sessions.iter() {
                    if tx.send(text.clone()).is_err() {
                        tracing::debug!(%session, event, "Session writer gone");
                    }
                }
            }
        }
    }
}
