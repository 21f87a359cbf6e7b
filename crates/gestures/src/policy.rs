//! Per-gesture emission policy table.

use std::collections::HashMap;
use std::time::Duration;

use gestura_landmarks::HandPose;
use serde::{Deserialize, Serialize};

use crate::classify;
use crate::GestureKind;

/// Cooldown between OK sign events for one session.
pub const OK_SIGN_COOLDOWN: Duration = Duration::from_secs(3);

/// Cooldown between pinky reactions for one session.
pub const PINKY_UP_COOLDOWN: Duration = Duration::from_secs(5);

/// Cooldown between screenshots for one session.
pub const OPEN_PALM_COOLDOWN: Duration = Duration::from_secs(3);

/// One geometric predicate. Some predicates can yield two kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    OkSign,
    PinkyUp,
    Thumbs,
    OpenPalm,
    Mic,
}

impl Classifier {
    pub const ALL: [Classifier; 5] = [
        Self::OkSign,
        Self::PinkyUp,
        Self::Thumbs,
        Self::OpenPalm,
        Self::Mic,
    ];

    pub fn classify(self, pose: &HandPose) -> Option<GestureKind> {
        match self {
            Self::OkSign => classify::ok_sign(pose),
            Self::PinkyUp => classify::pinky_up(pose),
            Self::Thumbs => classify::thumbs(pose),
            Self::OpenPalm => classify::open_palm(pose),
            Self::Mic => classify::mic(pose),
        }
    }
}

/// How repeated matches are throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Emit only if at least this long has passed since the last emission.
    Cooldown(Duration),
    /// Emit on every matching frame.
    Unthrottled,
    /// Emit only when the match flips the shared mic latch.
    Latch,
}

/// Whose state a gate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    PerSession,
    Global,
}

/// Who receives an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPolicy {
    Origin,
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GesturePolicy {
    pub classifier: Classifier,
    pub gate: Gate,
    pub scope: Scope,
    pub target: TargetPolicy,
    pub enabled: bool,
}

impl GesturePolicy {
    pub const fn cooldown(classifier: Classifier, cooldown: Duration) -> Self {
        Self {
            classifier,
            gate: Gate::Cooldown(cooldown),
            scope: Scope::PerSession,
            target: TargetPolicy::Origin,
            enabled: true,
        }
    }

    pub const fn unthrottled(classifier: Classifier) -> Self {
        Self {
            classifier,
            gate: Gate::Unthrottled,
            scope: Scope::PerSession,
            target: TargetPolicy::Origin,
            enabled: true,
        }
    }

    pub const fn latch(classifier: Classifier) -> Self {
        Self {
            classifier,
            gate: Gate::Latch,
            scope: Scope::Global,
            target: TargetPolicy::Broadcast,
            enabled: true,
        }
    }
}

/// Deployment overrides for one classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub enabled: Option<bool>,
    /// Replaces the gate with a cooldown; `0` means unthrottled. Ignored for the mic latch.
    pub cooldown_secs: Option<f64>,
}

/// Overrides keyed by classifier, e.g. `[gestures.thumbs] cooldown_secs = 1.0`.
pub type GestureSettings = HashMap<Classifier, ClassifierSettings>;

/// The full policy table, evaluated in order on every pose.
#[derive(Debug, Clone, PartialEq)]
pub struct GesturePolicies {
    policies: Vec<GesturePolicy>,
}

impl Default for GesturePolicies {
    fn default() -> Self {
        Self {
            policies: vec![
                GesturePolicy::cooldown(Classifier::OkSign, OK_SIGN_COOLDOWN),
                GesturePolicy::cooldown(Classifier::PinkyUp, PINKY_UP_COOLDOWN),
                GesturePolicy::unthrottled(Classifier::Thumbs),
                GesturePolicy::cooldown(Classifier::OpenPalm, OPEN_PALM_COOLDOWN),
                GesturePolicy::latch(Classifier::Mic),
            ],
        }
    }
}

impl GesturePolicies {
    pub fn new(policies: Vec<GesturePolicy>) -> Self {
        Self { policies }
    }

    /// Defaults with deployment overrides applied.
    pub fn from_settings(settings: &GestureSettings) -> Self {
        let mut policies = Self::default();
        for policy in &mut policies.policies {
            let Some(overrides) = settings.get(&policy.classifier) else {
                continue;
            };
            if let Some(enabled) = overrides.enabled {
                policy.enabled = enabled;
            }
            match (policy.gate, overrides.cooldown_secs) {
                (Gate::Latch, Some(_)) => {
                    tracing::warn!(classifier = ?policy.classifier, "Ignoring cooldown override for latched gesture");
                }
                (_, Some(secs)) if secs > 0.0 && secs.is_finite() => {
                    policy.gate = Gate::Cooldown(Duration::from_secs_f64(secs));
                }
                (_, Some(_)) => policy.gate = Gate::Unthrottled,
                (_, None) => {}
            }
        }
        policies
    }

    pub fn iter(&self) -> impl Iterator<Item = &GesturePolicy> {
        self.policies.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &GesturePolicy> {
        self.policies.iter().filter(|p| p.enabled)
    }

    pub fn get(&self, classifier: Classifier) -> Option<&GesturePolicy> {
        self.policies.iter().find(|p| p.classifier == classifier)
    }
}
