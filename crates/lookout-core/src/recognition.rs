//! Recognition-identity cache.
//!
//! Holds the last confirmed identity per track id, rate-limits outbound
//! recognition requests, and keeps a geometry-keyed position cache so an
//! identity can survive the tracker renumbering a face that never left
//! its spot.

use crate::geometry::Rect;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Grid cell size (px) for position-cache keys. Confirmations landing in
/// the same cell overwrite each other instead of piling up.
const POSITION_CELL: i32 = 10;

/// An identity attributed to a track by the remote recognizer.
#[derive(Debug, Clone)]
pub struct RecognizedIdentity {
    pub person_id: String,
    pub person_name: String,
    pub confidence: f32,
    pub timestamp: Instant,
}

#[derive(Debug, Clone)]
struct PositionEntry {
    center: (i32, i32),
    identity: RecognizedIdentity,
}

#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// How long an identity outlives its last refresh.
    pub recognition_timeout: Duration,
    /// Minimum spacing between outbound requests per track id.
    pub send_interval: Duration,
    /// Results below this confidence are discarded.
    pub confidence_threshold: f32,
    /// Max center distance (px) for position-based re-association.
    pub position_match_distance: f32,
    /// Position-cache entries older than this are dropped during scans.
    pub position_cache_timeout: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            recognition_timeout: Duration::from_secs(5),
            send_interval: Duration::from_secs(1),
            confidence_threshold: 0.7,
            position_match_distance: 50.0,
            position_cache_timeout: Duration::from_secs(10),
        }
    }
}

pub struct RecognitionManager {
    identities: HashMap<u32, RecognizedIdentity>,
    last_send: HashMap<u32, Instant>,
    position_cache: HashMap<(i32, i32), PositionEntry>,
    config: RecognitionConfig,
}

impl RecognitionManager {
    pub fn new(config: RecognitionConfig) -> Self {
        Self {
            identities: HashMap::new(),
            last_send: HashMap::new(),
            position_cache: HashMap::new(),
            config,
        }
    }

    /// True when enough time has passed since the last send for this id.
    pub fn should_send(&self, face_id: u32) -> bool {
        match self.last_send.get(&face_id) {
            Some(sent) => sent.elapsed() >= self.config.send_interval,
            None => true,
        }
    }

    pub fn mark_sent(&mut self, face_id: u32) {
        self.last_send.insert(face_id, Instant::now());
    }

    /// Commit a recognition result for a track.
    ///
    /// Sub-threshold confidence is discarded outright. On commit the
    /// identity is also duplicated into the position cache (when the
    /// request's bounding box is known) so a future track at the same
    /// spot can pick it up.
    pub fn update_identity(
        &mut self,
        face_id: u32,
        person_id: &str,
        person_name: &str,
        confidence: f32,
        region: Option<Rect>,
    ) {
        if confidence < self.config.confidence_threshold {
            tracing::debug!(face_id, confidence, "low confidence result ignored");
            return;
        }

        let identity = RecognizedIdentity {
            person_id: person_id.to_string(),
            person_name: person_name.to_string(),
            confidence,
            timestamp: Instant::now(),
        };

        if let Some(region) = region {
            let center = region.center();
            self.position_cache.insert(
                quantize(center),
                PositionEntry {
                    center,
                    identity: identity.clone(),
                },
            );
        }

        tracing::info!(face_id, person = person_name, confidence, "identity confirmed");
        self.identities.insert(face_id, identity);
    }

    /// Identity for a track, expiring it on read when stale.
    pub fn get_identity(&mut self, face_id: u32) -> Option<&RecognizedIdentity> {
        if let Some(identity) = self.identities.get(&face_id) {
            if identity.timestamp.elapsed() > self.config.recognition_timeout {
                self.identities.remove(&face_id);
                return None;
            }
        }
        self.identities.get(&face_id)
    }

    /// Try to bind a cached identity to a new track id by position.
    ///
    /// Scans the position cache (dropping stale entries as it goes) for
    /// the nearest surviving entry within the match distance. Keys are
    /// visited in sorted order so exact-distance ties resolve the same
    /// way every time.
    pub fn assign_identity_from_cache(&mut self, face_id: u32, region: Rect) -> bool {
        let now = Instant::now();
        let timeout = self.config.position_cache_timeout;
        self.position_cache
            .retain(|_, entry| now.duration_since(entry.identity.timestamp) <= timeout);

        let center = region.center();
        let mut keys: Vec<(i32, i32)> = self.position_cache.keys().copied().collect();
        keys.sort_unstable();

        let mut best: Option<(f32, (i32, i32))> = None;
        for key in keys {
            let entry = &self.position_cache[&key];
            let dx = (center.0 - entry.center.0) as f32;
            let dy = (center.1 - entry.center.1) as f32;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance >= self.config.position_match_distance {
                continue;
            }
            if best.map_or(true, |(best_d, _)| distance < best_d) {
                best = Some((distance, key));
            }
        }

        let Some((distance, key)) = best else {
            return false;
        };

        let cached = &self.position_cache[&key];
        let identity = RecognizedIdentity {
            timestamp: now,
            ..cached.identity.clone()
        };
        tracing::debug!(
            face_id,
            person = %identity.person_name,
            distance,
            "identity re-associated by position"
        );
        self.identities.insert(face_id, identity);
        true
    }

    /// Keep identities of on-screen faces alive even when nothing is
    /// being re-sent for them.
    pub fn refresh_active_faces(&mut self, active_ids: &[u32]) {
        let now = Instant::now();
        for id in active_ids {
            if let Some(identity) = self.identities.get_mut(id) {
                identity.timestamp = now;
            }
        }
    }

    /// Drop identities and send markers for tracks that left the screen,
    /// and sweep stale position-cache entries.
    pub fn cleanup_not_visible(&mut self, active_ids: &[u32]) {
        let active: HashSet<u32> = active_ids.iter().copied().collect();
        let now = Instant::now();

        let recognition_timeout = self.config.recognition_timeout;
        self.identities.retain(|id, identity| {
            active.contains(id) && now.duration_since(identity.timestamp) <= recognition_timeout
        });

        // Send markers linger a little longer than identities so a track
        // that blips out for a frame is not immediately re-sent.
        let marker_timeout = recognition_timeout * 2;
        self.last_send
            .retain(|id, sent| active.contains(id) && now.duration_since(*sent) <= marker_timeout);

        let cache_timeout = self.config.position_cache_timeout;
        self.position_cache
            .retain(|_, entry| now.duration_since(entry.identity.timestamp) <= cache_timeout);
    }

    /// Snapshot of all live identities for rendering.
    pub fn identities_snapshot(&self) -> Vec<(u32, RecognizedIdentity)> {
        let mut all: Vec<(u32, RecognizedIdentity)> = self
            .identities
            .iter()
            .map(|(&id, identity)| (id, identity.clone()))
            .collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }

    pub fn clear_all(&mut self) {
        self.identities.clear();
        self.last_send.clear();
        self.position_cache.clear();
        tracing::debug!("recognition state cleared");
    }
}

impl Default for RecognitionManager {
    fn default() -> Self {
        Self::new(RecognitionConfig::default())
    }
}

fn quantize(center: (i32, i32)) -> (i32, i32) {
    (center.0.div_euclid(POSITION_CELL), center.1.div_euclid(POSITION_CELL))
}
