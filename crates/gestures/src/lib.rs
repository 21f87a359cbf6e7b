//! Gesture recognition over a single hand pose.
//!
//! Classification is split from emission:
//! - [`classify`] holds the pure geometric predicates
//! - [`GesturePolicies`] is the per-gesture table (classifier, gate, scope, target)
//! - [`GestureGate`] owns the only mutable state: cooldown timestamps and the mic latch

pub mod classify;
mod gate;
mod kind;
mod policy;

pub use gate::{CooldownStore, GestureGate, MicLatch, ScopeKey};
pub use kind::GestureKind;
pub use policy::{
    Classifier, ClassifierSettings, Gate, GesturePolicies, GesturePolicy, GestureSettings, Scope,
    TargetPolicy,
};
