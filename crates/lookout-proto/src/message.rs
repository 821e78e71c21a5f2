//! Outbound request framing.
//!
//! Wire format: `[4-byte big-endian header length][UTF-8 JSON header]
//! [JPEG payload]`. The payload is the face crop resized onto a fixed
//! square canvas and encoded at high quality.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use lookout_core::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canvas size the recognizer expects face crops on.
pub const FACE_CANVAS_SIZE: u32 = 112;
/// JPEG quality for face payloads.
pub const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("message truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("empty face crop")]
    EmptyCrop,
    #[error("header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("image encode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Which channel a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    Register,
    Recognize,
}

/// JSON header preceding the image payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub camera_id: String,
    pub face_id: u32,
    pub mode: ChannelMode,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: f64,
    /// Face bounding box in the full frame, (x, y, w, h).
    pub bbox: [i32; 4],
    /// Only present on register requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
}

impl RequestHeader {
    pub fn new(camera_id: &str, face_id: u32, mode: ChannelMode, bbox: Rect) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            face_id,
            mode,
            timestamp: chrono::Utc::now().timestamp_micros() as f64 / 1e6,
            bbox: bbox.to_array(),
            person_name: None,
        }
    }

    pub fn with_person_name(mut self, name: &str) -> Self {
        self.person_name = Some(name.to_string());
        self
    }
}

/// Serialize a request: resize the crop to the recognizer canvas, encode
/// it as JPEG, and frame it behind the length-prefixed JSON header.
pub fn encode_request(header: &RequestHeader, crop: &RgbImage) -> Result<Vec<u8>, ProtocolError> {
    if crop.width() == 0 || crop.height() == 0 {
        return Err(ProtocolError::EmptyCrop);
    }

    let resized = imageops::resize(crop, FACE_CANVAS_SIZE, FACE_CANVAS_SIZE, FilterType::Triangle);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&resized)?;

    let header_json = serde_json::to_vec(header)?;
    let mut message = Vec::with_capacity(4 + header_json.len() + jpeg.len());
    message.extend_from_slice(&(header_json.len() as u32).to_be_bytes());
    message.extend_from_slice(&header_json);
    message.extend_from_slice(&jpeg);
    Ok(message)
}

/// Split a framed request back into header and image payload.
pub fn decode_request(message: &[u8]) -> Result<(RequestHeader, &[u8]), ProtocolError> {
    if message.len() < 4 {
        return Err(ProtocolError::Truncated {
            needed: 4,
            have: message.len(),
        });
    }

    let header_len = u32::from_be_bytes([message[0], message[1], message[2], message[3]]) as usize;
    let needed = 4 + header_len;
    if message.len() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            have: message.len(),
        });
    }

    let header: RequestHeader = serde_json::from_slice(&message[4..needed])?;
    Ok((header, &message[needed..]))
}
