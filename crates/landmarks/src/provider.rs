//! Serialized access to landmark model instances.
//!
//! A model instance is only ever used by one caller at a time. How instances
//! are shared between sessions is a deployment choice:
//! - `Shared`: one instance, every session serializes on its mutex
//! - `Pool`: a fixed set of instances, each session pinned to one of them
//! - `PerSession`: a private instance created on demand and dropped on release

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{HandLandmarker, LandmarkError, Result};

/// A landmark model behind a mutex.
pub type SharedLandmarker = Arc<Mutex<Box<dyn HandLandmarker>>>;

/// Creates fresh model instances.
pub type LandmarkerFactory = Arc<dyn Fn() -> Result<Box<dyn HandLandmarker>> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Shared,
    Pool,
    PerSession,
}

/// Hands out model instances to sessions according to a [`StrategyKind`].
pub struct LandmarkerProvider {
    strategy: StrategyKind,
    factory: LandmarkerFactory,
    /// Eagerly created instances (`Shared` and `Pool`).
    instances: Vec<SharedLandmarker>,
    /// Lazily created per-session instances (`PerSession`).
    sessions: Mutex<HashMap<String, SharedLandmarker>>,
}

impl LandmarkerProvider {
    /// Create a provider, loading every eager instance up front.
    ///
    /// `pool_size` is only read for [`StrategyKind::Pool`] and is clamped to at least 1.
    pub fn new(strategy: StrategyKind, pool_size: usize, factory: LandmarkerFactory) -> Result<Self> {
        let eager = match strategy {
            StrategyKind::Shared => 1,
            StrategyKind::Pool => pool_size.max(1),
            StrategyKind::PerSession => 0,
        };

        let instances = (0..eager)
            .map(|_| factory().map(|landmarker| Arc::new(Mutex::new(landmarker))))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(?strategy, instances = instances.len(), "Created landmarker provider");

        Ok(Self {
            strategy,
            factory,
            instances,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Wrap a single already-loaded instance.
    pub fn shared(landmarker: Box<dyn HandLandmarker>) -> Self {
        let instance: SharedLandmarker = Arc::new(Mutex::new(landmarker));
        let factory: LandmarkerFactory = Arc::new(|| {
            Err(LandmarkError::Unavailable(
                "shared provider does not create instances".to_string(),
            ))
        });
        Self {
            strategy: StrategyKind::Shared,
            factory,
            instances: vec![instance],
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Get the instance a session must use.
    ///
    /// For `PerSession` the instance is created on first use.
    pub fn acquire(&self, session: &str) -> Result<SharedLandmarker> {
        match self.strategy {
            StrategyKind::Shared | StrategyKind::Pool => {
                let slot = pool_slot(session, self.instances.len());
                self.instances
                    .get(slot)
                    .cloned()
                    .ok_or(LandmarkError::ModelNotLoaded)
            }
            StrategyKind::PerSession => {
                if let Some(existing) = self.lock_sessions()?.get(session) {
                    return Ok(Arc::clone(existing));
                }

                // Model loads are slow; other sessions must not wait on the map meanwhile.
                let created: SharedLandmarker = Arc::new(Mutex::new((self.factory)()?));

                let mut sessions = self.lock_sessions()?;
                let instance = sessions
                    .entry(session.to_string())
                    .or_insert_with(|| {
                        tracing::debug!(session, "Created per-session landmarker");
                        Arc::clone(&created)
                    });
                Ok(Arc::clone(instance))
            }
        }
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<String, SharedLandmarker>>> {
        self.sessions
            .lock()
            .map_err(|_| LandmarkError::Unavailable("session map poisoned".to_string()))
    }

    /// Drop whatever the session owns.
    ///
    /// Shared instances are kept; a per-session instance is dropped once the
    /// last in-flight frame releases it.
    pub fn release(&self, session: &str) {
        if self.strategy != StrategyKind::PerSession {
            return;
        }
        if let Ok(mut sessions) = self.sessions.lock() {
            if sessions.remove(session).is_some() {
                tracing::debug!(session, "Released per-session landmarker");
            }
        }
    }

    /// Number of live model instances.
    pub fn instance_count(&self) -> usize {
        match self.strategy {
            StrategyKind::PerSession => self.sessions.lock().map(|s| s.len()).unwrap_or(0),
            _ => self.instances.len(),
        }
    }
}

fn pool_slot(session: &str, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    session.hash(&mut hasher);
    (hasher.finish() % len as u64) as usize
}
