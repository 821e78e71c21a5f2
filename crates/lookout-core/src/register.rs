//! Registration-session face locking.
//!
//! During a registration session the operator's selection must stay glued
//! to the same person even though the tracker renumbers ids at every
//! re-detection. Locks are matched by spatial proximity of box centers,
//! not by tracker id.

use crate::geometry::Rect;
use crate::tracker::TrackedFace;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// An operator-selected face pinned to a fixed id.
#[derive(Debug, Clone)]
pub struct LockedFace {
    pub region: Rect,
    pub last_seen: Instant,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct RegisterConfig {
    /// Lock released after this long without a matching face.
    pub lock_timeout: Duration,
    /// Max center distance (px) for a raw face to claim a lock.
    pub match_distance: f32,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            match_distance: 50.0,
        }
    }
}

pub struct RegisterManager {
    locked: HashMap<u32, LockedFace>,
    config: RegisterConfig,
}

impl RegisterManager {
    pub fn new(config: RegisterConfig) -> Self {
        Self {
            locked: HashMap::new(),
            config,
        }
    }

    /// Pin `face_id` to the given region. An existing lock is never
    /// overwritten; it must be released explicitly first.
    pub fn lock_face(&mut self, face_id: u32, region: Rect) {
        if self.locked.contains_key(&face_id) {
            tracing::debug!(face_id, "already locked");
            return;
        }
        self.locked.insert(
            face_id,
            LockedFace {
                region,
                last_seen: Instant::now(),
                selected: true,
            },
        );
        tracing::info!(face_id, "face locked for registration");
    }

    pub fn unlock_face(&mut self, face_id: u32) {
        if self.locked.remove(&face_id).is_some() {
            tracing::debug!(face_id, "face unlocked");
        }
    }

    pub fn is_locked(&self, face_id: u32) -> bool {
        self.locked.contains_key(&face_id)
    }

    /// Currently locked ids, sorted for stable display order.
    pub fn locked_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.locked.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn update_locked_position(&mut self, face_id: u32, region: Rect) {
        if let Some(lock) = self.locked.get_mut(&face_id) {
            lock.region = region;
            lock.last_seen = Instant::now();
        }
    }

    /// Remap raw tracker output onto locked ids.
    ///
    /// Each raw face within `match_distance` of a lock center is emitted
    /// under the locked id (one claim per lock per pass; a second face in
    /// the same radius is discarded). A raw face that matches no lock but
    /// whose tracker id collides with a locked id is moved to a synthetic
    /// id so the two never alias. Everything else passes through. Expired
    /// locks are swept afterwards.
    pub fn process_faces(&mut self, raw_faces: Vec<TrackedFace>) -> Vec<TrackedFace> {
        let mut out = Vec::with_capacity(raw_faces.len());
        let mut claimed: HashSet<u32> = HashSet::new();

        for mut face in raw_faces {
            match self.find_matching_lock(&face.region) {
                Some(locked_id) => {
                    if claimed.insert(locked_id) {
                        self.update_locked_position(locked_id, face.region);
                        face.id = locked_id;
                        out.push(face);
                    }
                    // Matched a lock someone already claimed this pass:
                    // drop the face rather than alias the identity.
                }
                None => {
                    if self.locked.contains_key(&face.id) {
                        // Tracker reused a number a lock owns.
                        let new_id = self.synthetic_id();
                        tracing::debug!(raw_id = face.id, new_id, "id collision remapped");
                        face.id = new_id;
                    }
                    out.push(face);
                }
            }
        }

        self.release_expired();
        out
    }

    pub fn clear_all(&mut self) {
        if !self.locked.is_empty() {
            tracing::debug!(count = self.locked.len(), "locks cleared");
        }
        self.locked.clear();
    }

    /// Nearest lock within the match distance; ties break to the lowest id
    /// so the result never depends on map iteration order.
    fn find_matching_lock(&self, region: &Rect) -> Option<u32> {
        let mut best: Option<(f32, u32)> = None;
        for (&id, lock) in &self.locked {
            let distance = region.center_distance(&lock.region);
            if distance >= self.config.match_distance {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_d, best_id)) => {
                    distance < best_d || (distance == best_d && id < best_id)
                }
            };
            if better {
                best = Some((distance, id));
            }
        }
        best.map(|(_, id)| id)
    }

    fn synthetic_id(&self) -> u32 {
        self.locked.keys().max().map_or(0, |max| max + 1)
    }

    fn release_expired(&mut self) {
        let timeout = self.config.lock_timeout;
        let now = Instant::now();
        self.locked.retain(|&id, lock| {
            let keep = now.duration_since(lock.last_seen) <= timeout;
            if !keep {
                tracing::info!(face_id = id, "lock released by timeout");
            }
            keep
        });
    }
}

impl Default for RegisterManager {
    fn default() -> Self {
        Self::new(RegisterConfig::default())
    }
}
