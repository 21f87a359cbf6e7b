//! Single-hand landmark model on ONNX Runtime.
//!
//! Runs a 224x224 landmark network over a region of interest and maps the 21
//! predicted points back into frame-normalized coordinates. With tracking on,
//! the next frame is cropped around the previous hand.

mod roi;

pub use roi::{map_to_frame, to_tensor, Roi, INPUT_SIZE, TRACKING_SCALE};

use gestura_landmarks::{
    DetectionResult, DetectorConfig, HandLandmarker, HandPose, LandmarkError, LANDMARK_COUNT,
};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum HandModelError {
    #[error("failed to load model: {0}")]
    Model(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, HandModelError>;

impl From<HandModelError> for LandmarkError {
    fn from(e: HandModelError) -> Self {
        match e {
            HandModelError::Model(msg) => LandmarkError::Unavailable(msg),
            HandModelError::Inference(msg) => LandmarkError::Inference(msg),
        }
    }
}

/// Output of one inference pass.
struct RawPrediction {
    landmarks: Vec<f32>,
    presence: f32,
}

pub struct OnnxHandLandmarker {
    session: Session,
    input_name: String,
    landmarks_output: String,
    presence_output: String,
    /// Last accepted pose, used as the next crop when tracking.
    tracked: Option<HandPose>,
}

impl OnnxHandLandmarker {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| HandModelError::Model(e.to_string()))?
            .with_parallel_execution(false)
            .map_err(|e| HandModelError::Model(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| HandModelError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| HandModelError::Model(e.to_string()))?
            .commit_from_file(model_path.as_ref())
            .map_err(|e| HandModelError::Model(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| HandModelError::Model("model has no inputs".to_string()))?;

        let output_named = |wanted: &str, position: usize| {
            session
                .outputs
                .iter()
                .find(|o| o.name == wanted)
                .or_else(|| session.outputs.get(position))
                .map(|o| o.name.clone())
        };
        let landmarks_output = output_named("Identity", 0)
            .ok_or_else(|| HandModelError::Model("model has no landmark output".to_string()))?;
        let presence_output = output_named("Identity_1", 1)
            .ok_or_else(|| HandModelError::Model("model has no presence output".to_string()))?;

        tracing::info!(
            path = %model_path.as_ref().display(),
            input = %input_name,
            landmarks = %landmarks_output,
            presence = %presence_output,
            "Loaded hand landmark model"
        );

        Ok(Self {
            session,
            input_name,
            landmarks_output,
            presence_output,
            tracked: None,
        })
    }

    fn infer(&mut self, image: &RgbImage, roi: &Roi) -> Result<RawPrediction> {
        let input = Tensor::from_array((
            [1i64, INPUT_SIZE as i64, INPUT_SIZE as i64, 3],
            to_tensor(image, roi),
        ))
        .map_err(|e| HandModelError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| HandModelError::Inference(e.to_string()))?;

        let landmarks = outputs
            .get(self.landmarks_output.as_str())
            .ok_or_else(|| HandModelError::Inference("missing landmark output".to_string()))?;
        let (_shape, landmarks) = landmarks
            .try_extract_tensor::<f32>()
            .map_err(|e| HandModelError::Inference(e.to_string()))?;
        if landmarks.len() < LANDMARK_COUNT * 3 {
            return Err(HandModelError::Inference(format!(
                "expected {} landmark values, got {}",
                LANDMARK_COUNT * 3,
                landmarks.len()
            )));
        }

        let presence = outputs
            .get(self.presence_output.as_str())
            .ok_or_else(|| HandModelError::Inference("missing presence output".to_string()))?;
        let (_shape, presence) = presence
            .try_extract_tensor::<f32>()
            .map_err(|e| HandModelError::Inference(e.to_string()))?;
        let presence = presence
            .first()
            .copied()
            .ok_or_else(|| HandModelError::Inference("empty presence output".to_string()))?;

        Ok(RawPrediction {
            landmarks: landmarks[..LANDMARK_COUNT * 3].to_vec(),
            presence: sigmoid(presence),
        })
    }

    /// Run one ROI and build a pose if presence clears `threshold`.
    fn detect_in(
        &mut self,
        image: &RgbImage,
        roi: &Roi,
        threshold: f32,
    ) -> Result<Option<HandPose>> {
        let prediction = self.infer(image, roi)?;
        if prediction.presence < threshold {
            tracing::trace!(presence = prediction.presence, threshold, "No hand in region");
            return Ok(None);
        }
        let (width, height) = image.dimensions();
        let landmarks = map_to_frame(&prediction.landmarks, roi, width, height);
        HandPose::from_slice(&landmarks)
            .map(Some)
            .map_err(|e| HandModelError::Inference(e.to_string()))
    }
}

impl HandLandmarker for OnnxHandLandmarker {
    fn name(&self) -> &'static str {
        "onnx-hand-landmark"
    }

    fn detect(
        &mut self,
        image: &RgbImage,
        config: &DetectorConfig,
    ) -> gestura_landmarks::Result<DetectionResult> {
        let (width, height) = image.dimensions();
        if config.max_hands == 0 {
            return Ok(DetectionResult::empty());
        }

        let tracked_roi = if config.tracking {
            self.tracked
                .as_ref()
                .and_then(|pose| Roi::around(pose, width, height, TRACKING_SCALE))
        } else {
            None
        };

        let mut pose = None;
        if let Some(roi) = tracked_roi {
            pose = self.detect_in(image, &roi, config.min_tracking_confidence)?;
            if pose.is_none() {
                tracing::debug!("Lost tracked hand, searching full frame");
            }
        }
        if pose.is_none() {
            let full = Roi::full(width, height);
            pose = self.detect_in(image, &full, config.min_detection_confidence)?;
        }

        self.tracked = if config.tracking { pose } else { None };

        Ok(pose.map(DetectionResult::single).unwrap_or_default())
    }

    fn reset(&mut self) {
        self.tracked = None;
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
