//! Frame intake: turns an inbound frame message into an RGB pixel buffer.
//!
//! Any malformed input is rejected here and never reaches the landmark model.
//! [`accept_frame`] is the boundary used by the pipeline: it logs the reason
//! and yields `None` instead of an error.

use base64::Engine;
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("frame has no image")]
    MissingImage,
    #[error("data URI has no payload separator")]
    MalformedDataUri,
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decoded image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, IntakeError>;

/// Inbound frame message: `{ "image": "<data URI or base64>" }`.
///
/// Producers: clients, at their own capture rate
/// Consumers: gesture pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(default)]
    pub image: Option<String>,
}

impl FrameMessage {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
        }
    }
}

/// Extract the base64 body of a payload.
///
/// `data:<mime>;base64,<body>` yields `<body>`; anything else is taken as bare base64.
fn base64_body(payload: &str) -> Result<&str> {
    let payload = payload.trim();
    if payload.starts_with("data:") {
        let (_, body) = payload
            .split_once(',')
            .ok_or(IntakeError::MalformedDataUri)?;
        return Ok(body.trim());
    }
    Ok(payload)
}

/// Decode a data URI or bare base64 string into raw image bytes.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let body = base64_body(payload)?;
    if body.is_empty() {
        return Err(IntakeError::EmptyPayload);
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(body)?;
    if bytes.is_empty() {
        return Err(IntakeError::EmptyPayload);
    }
    Ok(bytes)
}

/// Decode encoded image bytes (JPEG, PNG, ...) into 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    ensure_not_empty(image)
}

fn ensure_not_empty(image: RgbImage) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(IntakeError::EmptyImage { width, height });
    }
    Ok(image)
}

/// Validate and decode a frame message.
pub fn decode_frame(message: &FrameMessage) -> Result<RgbImage> {
    let payload = message
        .image
        .as_deref()
        .ok_or(IntakeError::MissingImage)?;
    let bytes = decode_payload(payload)?;
    decode_image(&bytes)
}

/// Decode a frame, logging and dropping it on any failure.
pub fn accept_frame(message: &FrameMessage) -> Option<RgbImage> {
    match decode_frame(message) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::debug!(error = %e, "Dropping frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn data_uri(bytes: &[u8]) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_decode_data_uri() {
        let message = FrameMessage::new(data_uri(&png_bytes(4, 3)));
        let image = decode_frame(&message).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(0, 0), &Rgb([200, 100, 50]));
    }

    #[test]
    fn test_decode_bare_base64() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2));
        let image = decode_frame(&FrameMessage::new(encoded)).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
    }

    #[test]
    fn test_missing_image_rejected() {
        let message: FrameMessage = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            decode_frame(&message),
            Err(IntakeError::MissingImage)
        ));
        assert!(accept_frame(&message).is_none());
    }

    #[test]
    fn test_data_uri_without_separator_rejected() {
        let message = FrameMessage::new("data:image/jpeg;base64");
        assert!(matches!(
            decode_frame(&message),
            Err(IntakeError::MalformedDataUri)
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            decode_payload("data:image/jpeg;base64,"),
            Err(IntakeError::EmptyPayload)
        ));
        assert!(matches!(decode_payload("   "), Err(IntakeError::EmptyPayload)));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let message = FrameMessage::new("data:image/jpeg;base64,not base64!!");
        assert!(matches!(decode_frame(&message), Err(IntakeError::Base64(_))));
    }

    #[test]
    fn test_undecodable_image_rejected() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"definitely not an image");
        let message = FrameMessage::new(format!("data:image/jpeg;base64,{encoded}"));
        assert!(matches!(decode_frame(&message), Err(IntakeError::Decode(_))));
        assert!(accept_frame(&message).is_none());
    }

    #[test]
    fn test_zero_sized_image_rejected() {
        assert!(matches!(
            ensure_not_empty(RgbImage::new(0, 5)),
            Err(IntakeError::EmptyImage {
                width: 0,
                height: 5
            })
        ));
    }
}
