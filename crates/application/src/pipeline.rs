//! One parameterized pipeline for every gesture:
//! intake -> landmarks -> classifiers -> gate -> emitter.

use std::sync::Arc;
use std::time::Instant;

use gestura_bus::PipelineStatus;
use gestura_events::{EventEmitterRef, EventTarget, MicStatusEvent, SessionId};
use gestura_gestures::{GestureGate, GestureKind, GesturePolicies, TargetPolicy};
use gestura_intake::FrameMessage;
use gestura_landmarks::{DetectorConfig, HandPose, LandmarkError, LandmarkerProvider};
use image::RgbImage;

use crate::clock::{ClockRef, SystemClock};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("landmarker: {0}")]
    Landmarker(#[from] LandmarkError),
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Intake rejected the payload.
    Rejected,
    /// The model ran and found no hand.
    NoHand,
    /// The model could not be run or failed.
    DetectionFailed,
    /// A hand was classified; lists what passed and what the gate held back.
    Classified {
        emitted: Vec<GestureKind>,
        suppressed: Vec<GestureKind>,
    },
}

impl FrameOutcome {
    pub fn emitted(&self) -> &[GestureKind] {
        match self {
            Self::Classified { emitted, .. } => emitted,
            _ => &[],
        }
    }
}

pub struct GesturePipeline {
    landmarkers: Arc<LandmarkerProvider>,
    detector_config: DetectorConfig,
    policies: GesturePolicies,
    gate: GestureGate,
    emitter: EventEmitterRef,
    status: Arc<PipelineStatus>,
    clock: ClockRef,
}

impl GesturePipeline {
    pub fn new(landmarkers: Arc<LandmarkerProvider>, emitter: EventEmitterRef) -> Self {
        Self {
            landmarkers,
            detector_config: DetectorConfig::default(),
            policies: GesturePolicies::default(),
            gate: GestureGate::new(),
            emitter,
            status: Arc::new(PipelineStatus::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_policies(mut self, policies: GesturePolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector_config = config;
        self
    }

    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_status(mut self, status: Arc<PipelineStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_gate(mut self, gate: GestureGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn status(&self) -> Arc<PipelineStatus> {
        Arc::clone(&self.status)
    }

    /// Current process-wide mic state, as served to status queries.
    pub fn mic_status(&self) -> MicStatusEvent {
        MicStatusEvent {
            status: self.gate.mic_status(),
        }
    }

    /// Prepare per-session resources. A per-session model is loaded here.
    pub fn open_session(&self, session: &SessionId) -> Result<(), PipelineError> {
        self.landmarkers.acquire(session.as_str())?;
        tracing::debug!(%session, strategy = ?self.landmarkers.strategy(), "Session opened");
        Ok(())
    }

    /// Release cooldown entries and any landmarker owned by the session.
    pub fn close_session(&self, session: &SessionId) {
        self.gate.release_session(session);
        self.landmarkers.release(session.as_str());
        tracing::debug!(%session, "Session closed");
    }

    /// Decode, detect and classify one inbound frame.
    pub fn process_frame(&self, session: &SessionId, frame: &FrameMessage) -> FrameOutcome {
        let Some(image) = gestura_intake::accept_frame(frame) else {
            self.status.increment_frames_rejected();
            return FrameOutcome::Rejected;
        };
        self.process_image(session, &image)
    }

    pub fn process_image(&self, session: &SessionId, image: &RgbImage) -> FrameOutcome {
        self.status.increment_frames_processed();
        let landmarker = match self.landmarkers.acquire(session.as_str()) {
            Ok(landmarker) => landmarker,
            Err(e) => {
                self.status.increment_detection_failures();
                tracing::warn!(%session, error = %e, "No landmarker for session");
                return FrameOutcome::DetectionFailed;
            }
        };

        let started = Instant::now();
        let detection = match landmarker.lock() {
            Ok(mut model) => model.detect(image, &self.detector_config),
            Err(poisoned) => {
                // A previous detect panicked mid-frame; its tracking state is suspect.
                tracing::warn!(%session, "Landmarker lock poisoned, resetting model");
                let mut model = poisoned.into_inner();
                model.reset();
                landmarker.clear_poison();
                model.detect(image, &self.detector_config)
            }
        };
        self.status
            .set_last_detection_ms(started.elapsed().as_millis() as u64);

        let result = match detection {
            Ok(result) => result,
            Err(e) => {
                self.status.increment_detection_failures();
                tracing::warn!(%session, error = %e, "Landmark detection failed");
                return FrameOutcome::DetectionFailed;
            }
        };

        match result.first() {
            Some(pose) => self.handle_pose(session, pose),
            None => {
                self.status.increment_frames_without_hand();
                tracing::trace!(%session, "No hand in frame");
                FrameOutcome::NoHand
            }
        }
    }

    /// Run every enabled classifier on a pose and emit what the gate admits.
    pub fn handle_pose(&self, session: &SessionId, pose: &HandPose) -> FrameOutcome {
        let mut emitted = Vec::new();
        let mut suppressed = Vec::new();

        for policy in self.policies.enabled() {
            let Some(kind) = policy.classifier.classify(pose) else {
                continue;
            };

            if !self.gate.admit(session, kind, policy, self.clock.now()) {
                tracing::trace!(%session, gesture = ?kind, "Gesture suppressed");
                suppressed.push(kind);
                continue;
            }

            let target = match policy.target {
                TargetPolicy::Origin => EventTarget::Session(session.clone()),
                TargetPolicy::Broadcast => EventTarget::Broadcast,
            };
            self.emitter.emit(&target, kind.event_name(), kind.payload());
            tracing::info!(%session, gesture = ?kind, event = kind.event_name(), "Gesture emitted");
            emitted.push(kind);
        }

        self.status.add_gestures_emitted(emitted.len() as u64);
        self.status.add_gestures_suppressed(suppressed.len() as u64);
        FrameOutcome::Classified {
            emitted,
            suppressed,
        }
    }
}
