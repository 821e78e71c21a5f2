//! Collaborator seams for the frame loop.
//!
//! Camera capture, rendering, and keyboard polling are platform concerns
//! living outside this crate; the loop only sees these traits.

use lookout_core::{Frame, Key, RecognizedIdentity, SessionState, TrackedFace};

/// Camera (or any other) frame producer.
pub trait FrameSource {
    /// Next frame, or `None` when capture transiently failed.
    fn read(&mut self) -> Option<Frame>;
}

/// Non-blocking operator keyboard.
pub trait InputSource {
    /// Key pressed since the last poll, if any.
    fn poll_key(&mut self) -> Option<Key>;
}

/// Everything a renderer needs to draw one frame of UI.
pub struct RenderContext<'a> {
    pub frame: &'a Frame,
    pub faces: &'a [TrackedFace],
    pub session: &'a SessionState,
    pub locked_ids: Vec<u32>,
    pub identities: Vec<(u32, RecognizedIdentity)>,
}

pub trait Renderer {
    fn draw(&mut self, ctx: &RenderContext<'_>);
}
