//! The per-frame loop.
//!
//! Single logical control thread: capture, detect/track, mode-specific
//! processing, render, bounded input poll. Nothing here blocks on the
//! network; the queue seam fails fast on full buffers and polls with a
//! short timeout. Every per-frame failure degrades to "skip this frame's
//! contribution" rather than terminating the loop.

use crate::config::Config;
use crate::hold::FrameHold;
use crate::io::{FrameSource, InputSource, RenderContext, Renderer};
use crate::metrics::FrameMetrics;
use lookout_core::{
    FaceDetector, FaceTracker, Frame, Mode, Rect, RecognitionManager, RegisterManager,
    SessionEffect, SessionState, TrackedFace, TrackerFactory,
};
use lookout_proto::{RecognitionClient, RecognitionResult, RegisterClient};
use std::collections::HashMap;
use std::time::Duration;

/// How often the frame-rate log line is emitted.
const METRICS_LOG_EVERY: u64 = 120;

pub struct App {
    tracker: FaceTracker,
    detector: Box<dyn FaceDetector>,
    register: RegisterManager,
    recognition: RecognitionManager,
    session: SessionState,
    register_client: Option<RegisterClient>,
    recognition_client: Option<RecognitionClient>,
    /// Bounding box of each in-flight recognition request, keyed by
    /// track id. Feeds the position cache when the result lands.
    pending_bbox: HashMap<u32, Rect>,
    hold: FrameHold,
    metrics: FrameMetrics,
}

impl App {
    pub fn new(
        config: &Config,
        detector: Box<dyn FaceDetector>,
        factory: TrackerFactory,
        register_client: Option<RegisterClient>,
        recognition_client: Option<RecognitionClient>,
    ) -> Self {
        Self {
            tracker: FaceTracker::new(config.tracker(), factory),
            detector,
            register: RegisterManager::new(config.register()),
            recognition: RecognitionManager::new(config.recognition()),
            session: SessionState::new(),
            register_client,
            recognition_client,
            pending_bbox: HashMap::new(),
            hold: FrameHold::new(),
            metrics: FrameMetrics::new(METRICS_LOG_EVERY),
        }
    }

    /// Drive the loop until the operator exits.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        input: &mut dyn InputSource,
        renderer: &mut dyn Renderer,
    ) {
        tracing::info!("frame loop started");
        loop {
            let Some(live) = source.read() else {
                tracing::warn!("frame capture failed");
                std::thread::sleep(Duration::from_millis(10));
                continue;
            };

            if !self.step(live, input, renderer) {
                break;
            }
            self.metrics.tick();
        }
        tracing::info!(fps = self.metrics.fps(), "frame loop stopped");
    }

    /// Process one frame. Returns false when the operator asked to exit.
    fn step(&mut self, live: Frame, input: &mut dyn InputSource, renderer: &mut dyn Renderer) -> bool {
        // While the operator types a name the world stays frozen.
        let frame = if self.session.is_selecting() {
            self.hold.select_frame(live)
        } else {
            live
        };

        let raw = self.tracker.process(&frame, &mut *self.detector);

        let faces = match self.session.mode {
            Mode::Register => self.step_register(&frame, raw),
            Mode::Recognize => self.step_recognize(raw),
        };

        renderer.draw(&RenderContext {
            frame: &frame,
            faces: &faces,
            session: &self.session,
            locked_ids: self.register.locked_ids(),
            identities: self.recognition.identities_snapshot(),
        });

        if let Some(key) = input.poll_key() {
            let was_register = self.session.mode == Mode::Register;

            match self.session.handle_key(key, &faces, &mut self.register) {
                Some(SessionEffect::Exit) => return false,
                Some(SessionEffect::SendRegistration {
                    face_id,
                    region,
                    name,
                }) => self.send_registration(face_id, region, &name, &faces),
                None => {}
            }

            // A mode switch abandons the old mode's in-flight bookkeeping.
            if was_register != (self.session.mode == Mode::Register) {
                self.pending_bbox.clear();
                self.hold.release();
            }
        }

        true
    }

    /// Register mode: remap tracker ids onto operator locks and manage
    /// the frozen frame per sub-state.
    fn step_register(&mut self, frame: &Frame, raw: Vec<TrackedFace>) -> Vec<TrackedFace> {
        let remapped = self.register.process_faces(raw);

        if self.session.is_selecting() {
            // Operate on the face list captured when selection ended.
            match self.hold.faces() {
                Some(frozen) => frozen.to_vec(),
                None => remapped,
            }
        } else {
            self.hold.release();
            self.hold.capture(frame, &remapped);
            remapped
        }
    }

    /// Recognize mode: rate-limited sends, result intake, position-based
    /// re-association, and liveness bookkeeping.
    fn step_recognize(&mut self, faces: Vec<TrackedFace>) -> Vec<TrackedFace> {
        // Leftover registration state means nothing here.
        self.register.clear_all();
        self.hold.release();

        if let Some(client) = self.recognition_client.as_mut() {
            for face in &faces {
                if self.recognition.should_send(face.id)
                    && client.send_recognition_request(&face.crop, face.id, face.region)
                {
                    self.recognition.mark_sent(face.id);
                    self.pending_bbox.insert(face.id, face.region);
                }
            }

            if let Some(result) = client.receive_result() {
                self.apply_result(result);
            }

            for face in &faces {
                if self.recognition.get_identity(face.id).is_none() {
                    self.recognition.assign_identity_from_cache(face.id, face.region);
                }
            }
        }

        let active: Vec<u32> = faces.iter().map(|f| f.id).collect();
        self.recognition.refresh_active_faces(&active);
        self.recognition.cleanup_not_visible(&active);
        self.pending_bbox.retain(|id, _| active.contains(id));

        faces
    }

    /// Fold one recognition result into the identity cache.
    fn apply_result(&mut self, result: RecognitionResult) {
        if result.face_id < 0 {
            tracing::debug!(person = %result.person_name, "result without usable track id ignored");
            return;
        }
        let face_id = result.face_id as u32;

        // A response can race its track's eviction; a missing pending
        // bbox just means no position-cache entry gets written.
        let region = self.pending_bbox.remove(&face_id);
        self.recognition.update_identity(
            face_id,
            &result.person_id,
            &result.person_name,
            result.confidence,
            region,
        );
    }

    /// Ship the frozen crop for a face the operator just named.
    fn send_registration(&mut self, face_id: u32, region: Rect, name: &str, faces: &[TrackedFace]) {
        let Some(client) = self.register_client.as_mut() else {
            tracing::warn!(face_id, "register channel disabled, request skipped");
            return;
        };

        let crop = faces
            .iter()
            .find(|f| f.id == face_id)
            .map(|f| f.crop.clone())
            .or_else(|| self.hold.frame().and_then(|frame| frame.crop(region)));

        match crop {
            Some(crop) => {
                client.send_register_request(&crop, face_id, region, name);
            }
            None => tracing::warn!(face_id, "no crop available for registration"),
        }
    }
}
