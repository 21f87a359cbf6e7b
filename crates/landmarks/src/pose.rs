//! Landmark, hand pose and detection result types.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::{LandmarkError, Result};

/// Number of landmarks in one hand pose.
pub const LANDMARK_COUNT: usize = 21;

/// A single 3-D point in frame-normalized coordinates.
///
/// `x` and `y` are in `0.0..=1.0` with the origin at the top-left corner, so a
/// smaller `y` is higher in the frame. `z` is relative depth with no fixed unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance over all three axes.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Anatomical role of each landmark, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    pub const ALL: [HandLandmark; LANDMARK_COUNT] = [
        Self::Wrist,
        Self::ThumbCmc,
        Self::ThumbMcp,
        Self::ThumbIp,
        Self::ThumbTip,
        Self::IndexMcp,
        Self::IndexPip,
        Self::IndexDip,
        Self::IndexTip,
        Self::MiddleMcp,
        Self::MiddlePip,
        Self::MiddleDip,
        Self::MiddleTip,
        Self::RingMcp,
        Self::RingPip,
        Self::RingDip,
        Self::RingTip,
        Self::PinkyMcp,
        Self::PinkyPip,
        Self::PinkyDip,
        Self::PinkyTip,
    ];

    /// Position of this role in the model's output.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The four non-thumb fingertips.
    pub const FINGERTIPS: [HandLandmark; 4] = [
        Self::IndexTip,
        Self::MiddleTip,
        Self::RingTip,
        Self::PinkyTip,
    ];
}

/// The complete set of landmarks for one detected hand.
///
/// Always holds exactly one landmark per [`HandLandmark`] role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandPose {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl HandPose {
    pub const fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { landmarks }
    }

    /// Build a pose from a flat landmark list, rejecting partial poses.
    pub fn from_slice(landmarks: &[Landmark]) -> Result<Self> {
        let landmarks: [Landmark; LANDMARK_COUNT] = landmarks
            .try_into()
            .map_err(|_| LandmarkError::InvalidLandmarkCount(landmarks.len()))?;
        Ok(Self { landmarks })
    }

    #[inline]
    pub fn get(&self, role: HandLandmark) -> &Landmark {
        &self.landmarks[role.index()]
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }

    pub fn wrist(&self) -> &Landmark {
        self.get(HandLandmark::Wrist)
    }

    pub fn thumb_tip(&self) -> &Landmark {
        self.get(HandLandmark::ThumbTip)
    }

    pub fn index_tip(&self) -> &Landmark {
        self.get(HandLandmark::IndexTip)
    }

    /// Builder-style override of a single landmark.
    pub fn with(mut self, role: HandLandmark, landmark: Landmark) -> Self {
        self.landmarks[role.index()] = landmark;
        self
    }
}

impl Index<HandLandmark> for HandPose {
    type Output = Landmark;

    fn index(&self, role: HandLandmark) -> &Landmark {
        self.get(role)
    }
}

/// Hands found in one frame, in model confidence order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    hands: Vec<HandPose>,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(pose: HandPose) -> Self {
        Self { hands: vec![pose] }
    }

    pub fn from_hands(hands: Vec<HandPose>) -> Self {
        Self { hands }
    }

    /// The only hand the gesture pipeline looks at.
    pub fn first(&self) -> Option<&HandPose> {
        self.hands.first()
    }

    pub fn hands(&self) -> &[HandPose] {
        &self.hands
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hands.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_match_model_order() {
        for (i, role) in HandLandmark::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
        assert_eq!(HandLandmark::ThumbTip.index(), 4);
        assert_eq!(HandLandmark::IndexTip.index(), 8);
        assert_eq!(HandLandmark::PinkyDip.index(), 19);
        assert_eq!(HandLandmark::PinkyTip.index(), 20);
    }

    #[test]
    fn test_from_slice_rejects_partial_pose() {
        let partial = vec![Landmark::default(); 20];
        match HandPose::from_slice(&partial) {
            Err(LandmarkError::InvalidLandmarkCount(n)) => assert_eq!(n, 20),
            other => panic!("expected InvalidLandmarkCount, got {:?}", other),
        }
    }

    #[test]
    fn test_from_slice_keeps_order() {
        let points: Vec<Landmark> = (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(i as f32 / 100.0, 0.0, 0.0))
            .collect();
        let pose = HandPose::from_slice(&points).unwrap();
        assert_eq!(pose[HandLandmark::IndexTip].x, 0.08);
        assert_eq!(pose.wrist().x, 0.0);
    }

    #[test]
    fn test_distance_is_three_dimensional() {
        let a = Landmark::new(0.0, 0.0, 0.0);
        let b = Landmark::new(0.0, 0.0, 0.3);
        assert!((a.distance(&b) - 0.3).abs() < 1e-6);

        let c = Landmark::new(0.3, 0.4, 0.0);
        assert!((a.distance(&c) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_with_overrides_single_role() {
        let pose = HandPose::new([Landmark::default(); LANDMARK_COUNT])
            .with(HandLandmark::ThumbTip, Landmark::new(0.5, 0.5, 0.0));
        assert_eq!(pose.thumb_tip().x, 0.5);
        assert_eq!(pose.index_tip().x, 0.0);
    }

    #[test]
    fn test_detection_result_first() {
        let pose = HandPose::new([Landmark::new(0.1, 0.2, 0.0); LANDMARK_COUNT]);
        let other = HandPose::new([Landmark::new(0.9, 0.9, 0.0); LANDMARK_COUNT]);
        let result = DetectionResult::from_hands(vec![pose, other]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.first(), Some(&pose));
    }
}
