//! Frame hold for name entry.
//!
//! While the operator types a name the video must not move under them:
//! the frame and face list visible when selection was confirmed stay
//! frozen until the session leaves the selecting state, and the
//! registration send uses exactly that frozen crop.

use lookout_core::{Frame, TrackedFace};

#[derive(Default)]
pub struct FrameHold {
    held: Option<(Frame, Vec<TrackedFace>)>,
}

impl FrameHold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot unless one is already held.
    pub fn capture(&mut self, frame: &Frame, faces: &[TrackedFace]) {
        if self.held.is_none() {
            tracing::debug!(faces = faces.len(), "frame held");
            self.held = Some((frame.clone(), faces.to_vec()));
        }
    }

    pub fn release(&mut self) {
        if self.held.take().is_some() {
            tracing::debug!("frame released");
        }
    }

    /// The frame the loop should process: the held one if frozen,
    /// otherwise the live one.
    pub fn select_frame(&self, live: Frame) -> Frame {
        match &self.held {
            Some((frame, _)) => frame.clone(),
            None => live,
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.held.as_ref().map(|(frame, _)| frame)
    }

    pub fn faces(&self) -> Option<&[TrackedFace]> {
        self.held.as_ref().map(|(_, faces)| faces.as_slice())
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u32) -> Frame {
        Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, sequence).unwrap()
    }

    #[test]
    fn test_capture_is_sticky() {
        let mut hold = FrameHold::new();
        hold.capture(&frame(1), &[]);
        hold.capture(&frame(2), &[]);
        assert_eq!(hold.frame().unwrap().sequence, 1);
    }

    #[test]
    fn test_release_then_capture() {
        let mut hold = FrameHold::new();
        hold.capture(&frame(1), &[]);
        hold.release();
        assert!(!hold.is_held());
        hold.capture(&frame(2), &[]);
        assert_eq!(hold.frame().unwrap().sequence, 2);
    }

    #[test]
    fn test_select_frame_prefers_held() {
        let mut hold = FrameHold::new();
        assert_eq!(hold.select_frame(frame(5)).sequence, 5);
        hold.capture(&frame(1), &[]);
        assert_eq!(hold.select_frame(frame(5)).sequence, 1);
    }
}
