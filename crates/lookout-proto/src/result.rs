//! Tolerant decoding of recognition/registration results.
//!
//! Two server generations are in the field. The modern schema carries
//! `face_id` as the integer track id and `person_id` as a string; the
//! legacy schema stuffs a UUID into `face_id`. Both are normalized here,
//! once, so nothing downstream ever branches on schema shape.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// `face_id` value when the result could not be tied to a track.
pub const UNKNOWN_FACE_ID: i64 = -1;

const DEFAULT_PERSON_NAME: &str = "Unknown";

#[derive(Error, Debug)]
pub enum ResultError {
    #[error("result is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A normalized recognition result.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Track id the result answers, or [`UNKNOWN_FACE_ID`].
    pub face_id: i64,
    pub person_id: String,
    pub person_name: String,
    pub confidence: f32,
}

/// Raw `face_id` field: integer on the modern schema, string (UUID or
/// stringified integer) on older servers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFaceId {
    Id(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    face_id: Option<RawFaceId>,
    #[serde(default)]
    person_id: Option<String>,
    #[serde(default)]
    person_name: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Decode a result message, tolerating the legacy schema and filling
/// absent fields with defaults.
pub fn decode_result(bytes: &[u8]) -> Result<RecognitionResult, ResultError> {
    let raw: RawResult = serde_json::from_slice(bytes)?;

    let person_id = raw.person_id.unwrap_or_default();
    let (face_id, person_id) = match raw.face_id {
        Some(RawFaceId::Id(id)) => (id, person_id),
        Some(RawFaceId::Text(text)) => {
            if Uuid::parse_str(&text).is_ok() {
                tracing::debug!("legacy result schema: UUID in face_id");
                (UNKNOWN_FACE_ID, text)
            } else if let Ok(id) = text.parse::<i64>() {
                (id, person_id)
            } else {
                (UNKNOWN_FACE_ID, person_id)
            }
        }
        None => (UNKNOWN_FACE_ID, person_id),
    };

    Ok(RecognitionResult {
        face_id,
        person_id,
        person_name: raw
            .person_name
            .unwrap_or_else(|| DEFAULT_PERSON_NAME.to_string()),
        confidence: raw.confidence.unwrap_or(0.0),
    })
}
