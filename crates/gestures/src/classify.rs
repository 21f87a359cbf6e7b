//! Geometric gesture predicates.
//!
//! Every function here is pure: the same pose always yields the same answer.
//! Coordinates are frame-normalized with `y` growing downward, so "above"
//! means a smaller `y`.

use gestura_landmarks::{HandLandmark, HandPose};

use crate::GestureKind;

/// Thumb and index tips closer than this form an OK sign.
pub const OK_SIGN_MAX_DISTANCE: f32 = 0.05;

/// How far the pinky tip must sit above its DIP joint.
pub const PINKY_RAISE_MARGIN: f32 = 0.02;

/// Maximum horizontal thumb offset from the wrist for an open palm.
pub const OPEN_PALM_MAX_THUMB_OFFSET: f32 = 0.2;

/// Horizontal index offset from the wrist that counts as a mic swipe.
pub const MIC_SWIPE_OFFSET: f32 = 0.15;

pub fn ok_sign(pose: &HandPose) -> Option<GestureKind> {
    (pose.thumb_tip().distance(pose.index_tip()) < OK_SIGN_MAX_DISTANCE)
        .then_some(GestureKind::OkSign)
}

pub fn pinky_up(pose: &HandPose) -> Option<GestureKind> {
    let tip = pose.get(HandLandmark::PinkyTip);
    let dip = pose.get(HandLandmark::PinkyDip);
    (tip.y < dip.y - PINKY_RAISE_MARGIN).then_some(GestureKind::PinkyUp)
}

/// Thumb strictly above (up) or below (down) the four fingertips and the wrist.
///
/// Up is checked first.
pub fn thumbs(pose: &HandPose) -> Option<GestureKind> {
    let thumb = pose.thumb_tip().y;
    let others = HandLandmark::FINGERTIPS
        .iter()
        .map(|role| pose.get(*role).y)
        .chain(std::iter::once(pose.wrist().y));

    let (mut above_all, mut below_all) = (true, true);
    for y in others {
        above_all &= thumb < y;
        below_all &= thumb > y;
    }

    if above_all {
        Some(GestureKind::ThumbsUp)
    } else if below_all {
        Some(GestureKind::ThumbsDown)
    } else {
        None
    }
}

pub fn open_palm(pose: &HandPose) -> Option<GestureKind> {
    let wrist = pose.wrist();
    let thumb_near = (wrist.x - pose.thumb_tip().x).abs() < OPEN_PALM_MAX_THUMB_OFFSET;
    let fingers_up = HandLandmark::FINGERTIPS
        .iter()
        .all(|role| pose.get(*role).y < wrist.y);
    (thumb_near && fingers_up).then_some(GestureKind::OpenPalm)
}

/// Index finger swept left of the wrist turns the mic off, right turns it on.
pub fn mic(pose: &HandPose) -> Option<GestureKind> {
    let dx = pose.index_tip().x - pose.wrist().x;
    if dx < -MIC_SWIPE_OFFSET {
        Some(GestureKind::MicOff)
    } else if dx > MIC_SWIPE_OFFSET {
        Some(GestureKind::MicOn)
    } else {
        None
    }
}
