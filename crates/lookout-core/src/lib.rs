//! lookout-core — identity continuity and session state for the live
//! face-identification client.
//!
//! Keeps a stable numeric identity attached to a moving face across
//! frames, tracker loss, and asynchronous recognition round-trips, and
//! drives the operator's register/recognize session.

pub mod frame;
pub mod geometry;
pub mod recognition;
pub mod register;
pub mod session;
pub mod tracker;

pub use frame::Frame;
pub use geometry::Rect;
pub use recognition::{RecognitionConfig, RecognitionManager, RecognizedIdentity};
pub use register::{RegisterConfig, RegisterManager};
pub use session::{Key, Mode, RegisterState, SessionEffect, SessionState};
pub use tracker::{FaceDetector, FaceTracker, SingleTracker, TrackedFace, TrackerConfig, TrackerFactory};
