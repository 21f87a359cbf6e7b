//! Debounce state: per-scope cooldown timestamps and the process-wide mic latch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use gestura_events::{MicStatus, SessionId};

use crate::{Gate, GestureKind, GesturePolicy, Scope};

/// Whose cooldown entries a gesture reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Session(SessionId),
    Global,
}

impl ScopeKey {
    fn for_policy(scope: Scope, session: &SessionId) -> Self {
        match scope {
            Scope::PerSession => Self::Session(session.clone()),
            Scope::Global => Self::Global,
        }
    }
}

/// Last-emission timestamps, grouped by scope so a session's entries can be
/// dropped together.
#[derive(Debug, Default)]
pub struct CooldownStore {
    entries: Mutex<HashMap<ScopeKey, HashMap<GestureKind, Instant>>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an emission at `now` if the cooldown has elapsed.
    ///
    /// An absent entry always passes. A rejected attempt leaves the entry untouched.
    pub fn try_acquire(
        &self,
        key: ScopeKey,
        kind: GestureKind,
        cooldown: Duration,
        now: Instant,
    ) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(gesture = ?kind, "Cooldown store poisoned, skipping gesture");
            return false;
        };
        let per_kind = entries.entry(key).or_default();
        match per_kind.get_mut(&kind) {
            Some(last) => {
                if now.saturating_duration_since(*last) < cooldown {
                    return false;
                }
                *last = (*last).max(now);
                true
            }
            None => {
                per_kind.insert(kind, now);
                true
            }
        }
    }

    pub fn last_emission(&self, key: &ScopeKey, kind: GestureKind) -> Option<Instant> {
        self.entries
            .lock()
            .ok()?
            .get(key)
            .and_then(|per_kind| per_kind.get(&kind))
            .copied()
    }

    /// Drop every entry owned by a session.
    pub fn release_session(&self, session: &SessionId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&ScopeKey::Session(session.clone()));
        }
    }

    /// Number of scopes holding entries.
    pub fn scope_count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Process-wide mic state, shared by every session. Starts `On`.
#[derive(Debug)]
pub struct MicLatch {
    on: AtomicBool,
}

impl Default for MicLatch {
    fn default() -> Self {
        Self::new(MicStatus::default())
    }
}

impl MicLatch {
    pub fn new(initial: MicStatus) -> Self {
        Self {
            on: AtomicBool::new(initial == MicStatus::On),
        }
    }

    pub fn state(&self) -> MicStatus {
        if self.on.load(Ordering::SeqCst) {
            MicStatus::On
        } else {
            MicStatus::Off
        }
    }

    /// Move to `target`. Returns true only on a strict edge.
    pub fn transition(&self, target: MicStatus) -> bool {
        let want = target == MicStatus::On;
        self.on
            .compare_exchange(!want, want, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Decides whether a classified gesture is emitted.
#[derive(Debug, Default)]
pub struct GestureGate {
    cooldowns: CooldownStore,
    mic: MicLatch,
}

impl GestureGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mic(initial: MicStatus) -> Self {
        Self {
            cooldowns: CooldownStore::new(),
            mic: MicLatch::new(initial),
        }
    }

    /// Apply the policy's gate; on success the gate's state is already updated.
    pub fn admit(
        &self,
        session: &SessionId,
        kind: GestureKind,
        policy: &GesturePolicy,
        now: Instant,
    ) -> bool {
        match policy.gate {
            Gate::Unthrottled => true,
            Gate::Cooldown(cooldown) => {
                let key = ScopeKey::for_policy(policy.scope, session);
                self.cooldowns.try_acquire(key, kind, cooldown, now)
            }
            Gate::Latch => match kind.mic_status() {
                Some(status) => self.mic.transition(status),
                None => {
                    tracing::warn!(?kind, "Latch gate on a gesture without mic direction");
                    false
                }
            },
        }
    }

    pub fn mic_status(&self) -> MicStatus {
        self.mic.state()
    }

    pub fn cooldowns(&self) -> &CooldownStore {
        &self.cooldowns
    }

    pub fn release_session(&self, session: &SessionId) {
        self.cooldowns.release_session(session);
    }
}
