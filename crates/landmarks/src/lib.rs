//! Hand landmark geometry and the landmark-model boundary.
//!
//! A landmark model turns one decoded frame into zero or more [`HandPose`]s.
//! The model itself is a black box behind [`HandLandmarker`]; instances hold
//! mutable state and are only ever driven through `&mut self`, so concurrent
//! callers go through a [`LandmarkerProvider`].

mod pose;
mod provider;

pub use pose::{DetectionResult, HandLandmark, HandPose, Landmark, LANDMARK_COUNT};
pub use provider::{LandmarkerFactory, LandmarkerProvider, SharedLandmarker, StrategyKind};

use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LandmarkError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("expected 21 landmarks, got {0}")]
    InvalidLandmarkCount(usize),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("landmarker unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, LandmarkError>;

/// Per-deployment detector settings passed on every `detect` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Maximum number of hands to report. The pipeline only looks at the first.
    pub max_hands: usize,
    /// Reuse the previous frame's hand region instead of searching the full frame.
    pub tracking: bool,
    /// Minimum presence score for a hand found by a full-frame search.
    pub min_detection_confidence: f32,
    /// Minimum presence score for a hand found inside a tracked region.
    pub min_tracking_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: 1,
            tracking: false,
            min_detection_confidence: 0.6,
            min_tracking_confidence: 0.6,
        }
    }
}

/// A hand landmark model.
///
/// Implementations are not required to be `Sync`: the model's internal state
/// is not safe for concurrent invocation.
pub trait HandLandmarker: Send {
    fn name(&self) -> &'static str;
    fn detect(&mut self, image: &RgbImage, config: &DetectorConfig) -> Result<DetectionResult>;

    /// Forget any cross-frame tracking state.
    fn reset(&mut self) {}
}

/// Landmarker that never finds a hand.
///
/// Used when no model is configured, so the transport can still be exercised.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLandmarker;

impl HandLandmarker for NullLandmarker {
    fn name(&self) -> &'static str {
        "null"
    }

    fn detect(&mut self, _image: &RgbImage, _config: &DetectorConfig) -> Result<DetectionResult> {
        Ok(DetectionResult::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_tracks_single_hand() {
        let config = DetectorConfig::default();
        assert_eq!(config.max_hands, 1);
        assert!(!config.tracking);
        assert!((config.min_detection_confidence - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_null_landmarker_finds_nothing() {
        let mut landmarker = NullLandmarker;
        let image = RgbImage::new(8, 8);
        let result = landmarker
            .detect(&image, &DetectorConfig::default())
            .unwrap();
        assert!(result.is_empty());
        assert!(result.first().is_none());
    }

    #[test]
    fn test_config_partial_deserialize() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"tracking": true, "min_detection_confidence": 0.7}"#)
                .unwrap();
        assert!(config.tracking);
        assert_eq!(config.max_hands, 1);
        assert!((config.min_detection_confidence - 0.7).abs() < f32::EPSILON);
        assert!((config.min_tracking_confidence - 0.6).abs() < f32::EPSILON);
    }
}
