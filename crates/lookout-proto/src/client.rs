//! Register and recognition clients.
//!
//! Thin senders over the queue seam. A dropped request is not an error
//! worth surfacing to the frame loop: the next send interval re-offers
//! the same face anyway, so capacity failures are logged, counted, and
//! forgotten.

use crate::message::{encode_request, ChannelMode, RequestHeader};
use crate::queue::{InboundQueue, OutboundQueue, QueueError};
use crate::result::{decode_result, RecognitionResult};
use image::RgbImage;
use lookout_core::Rect;
use std::time::Duration;

/// Push-only client for the registration channel.
pub struct RegisterClient {
    outbound: Box<dyn OutboundQueue>,
    camera_id: String,
    dropped: u64,
}

impl RegisterClient {
    pub fn new(outbound: Box<dyn OutboundQueue>, camera_id: &str) -> Self {
        Self {
            outbound,
            camera_id: camera_id.to_string(),
            dropped: 0,
        }
    }

    /// Ship a "register this face as name" request. Returns whether the
    /// request actually left the local buffer.
    pub fn send_register_request(
        &mut self,
        crop: &RgbImage,
        face_id: u32,
        bbox: Rect,
        person_name: &str,
    ) -> bool {
        let header = RequestHeader::new(&self.camera_id, face_id, ChannelMode::Register, bbox)
            .with_person_name(person_name);
        let message = match encode_request(&header, crop) {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(face_id, %error, "register request encode failed");
                return false;
            }
        };

        match self.outbound.try_push(message) {
            Ok(()) => {
                tracing::info!(face_id, name = person_name, "register request sent");
                true
            }
            Err(QueueError::Full) => {
                self.dropped += 1;
                tracing::warn!(face_id, dropped = self.dropped, "register buffer full, request dropped");
                false
            }
            Err(QueueError::Disconnected) => {
                tracing::warn!(face_id, "register channel disconnected");
                false
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

/// Push/pull client for the recognition channel.
pub struct RecognitionClient {
    outbound: Box<dyn OutboundQueue>,
    inbound: Box<dyn InboundQueue>,
    camera_id: String,
    recv_poll: Duration,
    dropped: u64,
}

impl RecognitionClient {
    pub fn new(
        outbound: Box<dyn OutboundQueue>,
        inbound: Box<dyn InboundQueue>,
        camera_id: &str,
        recv_poll: Duration,
    ) -> Self {
        Self {
            outbound,
            inbound,
            camera_id: camera_id.to_string(),
            recv_poll,
            dropped: 0,
        }
    }

    /// Ship a face crop for recognition. Returns whether the request
    /// actually left the local buffer.
    pub fn send_recognition_request(&mut self, crop: &RgbImage, face_id: u32, bbox: Rect) -> bool {
        let header = RequestHeader::new(&self.camera_id, face_id, ChannelMode::Recognize, bbox);
        let message = match encode_request(&header, crop) {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(face_id, %error, "recognition request encode failed");
                return false;
            }
        };

        match self.outbound.try_push(message) {
            Ok(()) => {
                tracing::debug!(face_id, "recognition request sent");
                true
            }
            Err(QueueError::Full) => {
                self.dropped += 1;
                tracing::warn!(
                    face_id,
                    dropped = self.dropped,
                    "recognition buffer full, request dropped"
                );
                false
            }
            Err(QueueError::Disconnected) => {
                tracing::warn!(face_id, "recognition channel disconnected");
                false
            }
        }
    }

    /// Poll for one result without stalling the frame loop. Malformed
    /// messages are logged and swallowed.
    pub fn receive_result(&self) -> Option<RecognitionResult> {
        let bytes = self.inbound.poll(self.recv_poll)?;
        match decode_result(&bytes) {
            Ok(result) => {
                tracing::debug!(
                    face_id = result.face_id,
                    person = %result.person_name,
                    confidence = result.confidence,
                    "result received"
                );
                Some(result)
            }
            Err(error) => {
                tracing::error!(%error, "undecodable result dropped");
                None
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
