//! Region-of-interest cropping and coordinate mapping.

use gestura_landmarks::{HandPose, Landmark, LANDMARK_COUNT};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Square side length of the model input.
pub const INPUT_SIZE: u32 = 224;

/// How much a tracked box is grown around the previous landmarks.
pub const TRACKING_SCALE: f32 = 1.5;

/// A pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
        }
    }

    /// Square box around a pose, scaled by `scale` and clipped to the frame.
    ///
    /// Returns `None` if the clipped box is degenerate.
    pub fn around(pose: &HandPose, frame_width: u32, frame_height: u32, scale: f32) -> Option<Self> {
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for lm in pose.landmarks() {
            min_x = min_x.min(lm.x * fw);
            max_x = max_x.max(lm.x * fw);
            min_y = min_y.min(lm.y * fh);
            max_y = max_y.max(lm.y * fh);
        }

        let side = (max_x - min_x).max(max_y - min_y) * scale;
        let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

        let left = (cx - side / 2.0).clamp(0.0, fw);
        let top = (cy - side / 2.0).clamp(0.0, fh);
        let right = (cx + side / 2.0).clamp(0.0, fw);
        let bottom = (cy + side / 2.0).clamp(0.0, fh);

        let width = (right - left).round() as u32;
        let height = (bottom - top).round() as u32;
        if width < 2 || height < 2 {
            return None;
        }

        Some(Self {
            left: left.round() as u32,
            top: top.round() as u32,
            width: width.min(frame_width.saturating_sub(left.round() as u32)),
            height: height.min(frame_height.saturating_sub(top.round() as u32)),
        })
    }
}

/// Crop `roi` out of `image`, resize to the model input and flatten as NHWC in `[0, 1]`.
pub fn to_tensor(image: &RgbImage, roi: &Roi) -> Vec<f32> {
    let crop = imageops::crop_imm(image, roi.left, roi.top, roi.width, roi.height).to_image();
    let resized = imageops::resize(&crop, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect()
}

/// Map raw model output (`x, y, z` triples in input-pixel space) into
/// frame-normalized landmarks.
pub fn map_to_frame(raw: &[f32], roi: &Roi, frame_width: u32, frame_height: u32) -> Vec<Landmark> {
    let input = INPUT_SIZE as f32;
    let sx = roi.width as f32 / input;
    let sy = roi.height as f32 / input;
    let (fw, fh) = (frame_width.max(1) as f32, frame_height.max(1) as f32);

    raw.chunks_exact(3)
        .take(LANDMARK_COUNT)
        .map(|xyz| {
            Landmark::new(
                (roi.left as f32 + xyz[0] * sx) / fw,
                (roi.top as f32 + xyz[1] * sy) / fh,
                xyz[2] * sx / fw,
            )
        })
        .collect()
}
