//! Multi-face tracker with short-horizon re-identification.
//!
//! Owns a pool of single-object tracker primitives and keeps a stable
//! numeric id attached to each face across frames. Identity survives
//! periodic re-detection (IoU matching against remembered boxes) and a
//! bounded grace period after a track is lost.

use crate::frame::Frame;
use crate::geometry::Rect;
use image::RgbImage;
use std::time::{Duration, Instant};

/// Face detection collaborator. Returns candidate boxes for a full frame;
/// degenerate boxes are filtered by the tracker.
pub trait FaceDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<Rect>;
}

/// Single-object visual tracker primitive.
///
/// Given an image region at init time, predicts its new location on each
/// subsequent frame. `update` returning `None` means the primitive lost
/// the object.
pub trait SingleTracker {
    fn init(&mut self, frame: &Frame, region: Rect) -> bool;
    fn update(&mut self, frame: &Frame) -> Option<Rect>;
}

/// Factory minting a fresh primitive for each (re-)detected face.
pub type TrackerFactory = Box<dyn Fn() -> Box<dyn SingleTracker>>;

/// One visible face for the current frame.
#[derive(Clone)]
pub struct TrackedFace {
    pub id: u32,
    pub crop: RgbImage,
    pub region: Rect,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Wall-clock cadence between full re-detections.
    pub detection_interval: Duration,
    /// Minimum IoU for a new detection to reclaim a remembered id.
    /// Intentionally permissive to tolerate fast motion.
    pub iou_threshold: f32,
    /// How long a lost box stays eligible for re-identification.
    pub memory_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detection_interval: Duration::from_millis(500),
            iou_threshold: 0.15,
            memory_timeout: Duration::from_secs(2),
        }
    }
}

struct Track {
    id: u32,
    region: Rect,
    primitive: Box<dyn SingleTracker>,
}

/// A box that dropped out of tracking but whose id is still reclaimable.
struct RememberedBox {
    id: u32,
    region: Rect,
    lost_at: Instant,
}

pub struct FaceTracker {
    config: TrackerConfig,
    factory: TrackerFactory,
    tracks: Vec<Track>,
    memory: Vec<RememberedBox>,
    next_id: u32,
    last_detection: Option<Instant>,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig, factory: TrackerFactory) -> Self {
        tracing::info!(
            interval_ms = config.detection_interval.as_millis() as u64,
            iou_threshold = config.iou_threshold,
            "tracker initialized"
        );
        Self {
            config,
            factory,
            tracks: Vec::new(),
            memory: Vec::new(),
            next_id: 0,
            last_detection: None,
        }
    }

    /// Advance tracking one frame.
    ///
    /// Re-runs the detector when the cadence expires, otherwise steps every
    /// active primitive. Tracks whose primitive fails or whose region
    /// collapses are dropped silently into re-identification memory; the
    /// caller simply observes their absence.
    pub fn process(&mut self, frame: &Frame, detector: &mut dyn FaceDetector) -> Vec<TrackedFace> {
        let now = Instant::now();

        let due = self
            .last_detection
            .map_or(true, |last| now.duration_since(last) >= self.config.detection_interval);
        if due {
            self.redetect(frame, detector, now);
            self.last_detection = Some(now);
        }

        let mut faces = Vec::with_capacity(self.tracks.len());
        let mut kept = Vec::with_capacity(self.tracks.len());

        for mut track in self.tracks.drain(..) {
            let Some(raw) = track.primitive.update(frame) else {
                tracing::debug!(id = track.id, "tracker primitive lost object");
                self.memory.push(RememberedBox {
                    id: track.id,
                    region: track.region,
                    lost_at: now,
                });
                continue;
            };

            let Some(region) = raw.clamp_to(frame.width, frame.height) else {
                tracing::debug!(id = track.id, ?raw, "tracker region collapsed");
                self.memory.push(RememberedBox {
                    id: track.id,
                    region: track.region,
                    lost_at: now,
                });
                continue;
            };

            let Some(crop) = frame.crop(region) else {
                continue;
            };

            track.region = region;
            faces.push(TrackedFace {
                id: track.id,
                crop,
                region,
            });
            kept.push(track);
        }

        self.tracks = kept;
        faces
    }

    /// Drop all state, including the id counter.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.memory.clear();
        self.next_id = 0;
        self.last_detection = None;
        tracing::info!("tracker reset");
    }

    pub fn active_count(&self) -> usize {
        self.tracks.len()
    }

    /// Full re-detection pass: match fresh detections against remembered
    /// boxes by IoU and rebuild the track set on the new boxes.
    fn redetect(&mut self, frame: &Frame, detector: &mut dyn FaceDetector, now: Instant) {
        // Remembered set = all active tracks plus boxes lost within the
        // grace period. Each remembered id is claimable at most once.
        let mut remembered: Vec<RememberedBox> = self
            .tracks
            .drain(..)
            .map(|t| RememberedBox {
                id: t.id,
                region: t.region,
                lost_at: now,
            })
            .collect();
        remembered.extend(
            self.memory
                .drain(..)
                .filter(|m| now.duration_since(m.lost_at) <= self.config.memory_timeout),
        );

        let boxes: Vec<Rect> = detector
            .detect(frame)
            .into_iter()
            .filter(|b| !b.is_degenerate())
            .collect();

        let assigned = assign_ids(&boxes, &remembered, self.config.iou_threshold);

        let mut claimed = vec![false; remembered.len()];
        for slot in assigned.iter().flatten() {
            claimed[*slot] = true;
        }

        self.tracks.clear();
        for (det_idx, bbox) in boxes.iter().enumerate() {
            let id = match assigned[det_idx] {
                Some(slot) => remembered[slot].id,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    id
                }
            };

            let mut primitive = (self.factory)();
            if !primitive.init(frame, *bbox) {
                tracing::warn!(id, ?bbox, "tracker primitive init failed");
                continue;
            }
            tracing::debug!(id, ?bbox, "track (re)started");
            self.tracks.push(Track {
                id,
                region: *bbox,
                primitive,
            });
        }

        // Unclaimed remembered boxes stay in memory until they expire.
        self.memory = remembered
            .into_iter()
            .zip(claimed)
            .filter_map(|(m, used)| (!used).then_some(m))
            .collect();

        tracing::debug!(active = self.tracks.len(), remembered = self.memory.len(), "redetection done");
    }
}

/// Greedy bipartite assignment of detections to remembered boxes.
///
/// Candidate pairs above the IoU threshold are sorted by IoU descending;
/// ties break to the lowest remembered id, then the lowest detection
/// index, keeping the result independent of map iteration order. Returns,
/// per detection, the index of the remembered box it claimed.
fn assign_ids(boxes: &[Rect], remembered: &[RememberedBox], iou_threshold: f32) -> Vec<Option<usize>> {
    struct Candidate {
        iou: f32,
        remembered_idx: usize,
        det_idx: usize,
    }

    let mut candidates = Vec::new();
    for (det_idx, bbox) in boxes.iter().enumerate() {
        for (remembered_idx, mem) in remembered.iter().enumerate() {
            let iou = bbox.iou(&mem.region);
            if iou > iou_threshold {
                candidates.push(Candidate {
                    iou,
                    remembered_idx,
                    det_idx,
                });
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.iou
            .partial_cmp(&a.iou)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| remembered[a.remembered_idx].id.cmp(&remembered[b.remembered_idx].id))
            .then_with(|| a.det_idx.cmp(&b.det_idx))
    });

    let mut assigned: Vec<Option<usize>> = vec![None; boxes.len()];
    let mut box_taken = vec![false; boxes.len()];
    let mut mem_taken = vec![false; remembered.len()];

    for c in candidates {
        if box_taken[c.det_idx] || mem_taken[c.remembered_idx] {
            continue;
        }
        box_taken[c.det_idx] = true;
        mem_taken[c.remembered_idx] = true;
        assigned[c.det_idx] = Some(c.remembered_idx);
    }

    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn frame(seq: u32) -> Frame {
        Frame::new(vec![0u8; 320 * 240 * 3], 320, 240, seq).unwrap()
    }

    /// Detector that replays a script of detection lists, repeating the
    /// last entry once exhausted.
    struct ScriptedDetector {
        script: Vec<Vec<Rect>>,
        call: usize,
    }

    impl ScriptedDetector {
        fn new(script: Vec<Vec<Rect>>) -> Self {
            Self { script, call: 0 }
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &Frame) -> Vec<Rect> {
            let idx = self.call.min(self.script.len() - 1);
            self.call += 1;
            self.script[idx].clone()
        }
    }

    /// Primitive that holds whatever region it was initialized on.
    struct HoldingTracker {
        region: Option<Rect>,
        fail_updates: Rc<RefCell<bool>>,
    }

    impl SingleTracker for HoldingTracker {
        fn init(&mut self, _frame: &Frame, region: Rect) -> bool {
            self.region = Some(region);
            true
        }

        fn update(&mut self, _frame: &Frame) -> Option<Rect> {
            if *self.fail_updates.borrow() {
                None
            } else {
                self.region
            }
        }
    }

    fn holding_factory() -> (TrackerFactory, Rc<RefCell<bool>>) {
        let fail = Rc::new(RefCell::new(false));
        let fail2 = fail.clone();
        let factory: TrackerFactory = Box::new(move || {
            Box::new(HoldingTracker {
                region: None,
                fail_updates: fail2.clone(),
            })
        });
        (factory, fail)
    }

    fn every_frame_config() -> TrackerConfig {
        TrackerConfig {
            detection_interval: Duration::ZERO,
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn test_stable_id_across_small_motion() {
        let (factory, _) = holding_factory();
        let mut tracker = FaceTracker::new(every_frame_config(), factory);
        let mut detector = ScriptedDetector::new(vec![
            vec![Rect::new(100, 100, 60, 60)],
            vec![Rect::new(108, 104, 60, 60)],
        ]);

        let first = tracker.process(&frame(0), &mut detector);
        let second = tracker.process(&frame(1), &mut detector);

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn test_distant_box_gets_new_id() {
        let (factory, _) = holding_factory();
        let mut tracker = FaceTracker::new(every_frame_config(), factory);
        let mut detector = ScriptedDetector::new(vec![
            vec![Rect::new(10, 10, 40, 40)],
            vec![Rect::new(200, 180, 40, 40)],
        ]);

        let first = tracker.process(&frame(0), &mut detector);
        let second = tracker.process(&frame(1), &mut detector);

        assert_ne!(first[0].id, second[0].id);
    }

    #[test]
    fn test_two_faces_keep_distinct_ids() {
        let (factory, _) = holding_factory();
        let mut tracker = FaceTracker::new(every_frame_config(), factory);
        let a = Rect::new(20, 20, 50, 50);
        let b = Rect::new(200, 100, 50, 50);
        let mut detector = ScriptedDetector::new(vec![vec![a, b], vec![a, b]]);

        let first = tracker.process(&frame(0), &mut detector);
        let second = tracker.process(&frame(1), &mut detector);

        assert_eq!(first.len(), 2);
        let ids_first: Vec<u32> = first.iter().map(|f| f.id).collect();
        let ids_second: Vec<u32> = second.iter().map(|f| f.id).collect();
        assert_eq!(ids_first, ids_second);
        assert_ne!(ids_first[0], ids_first[1]);
    }

    #[test]
    fn test_grace_period_reclaims_id() {
        let (factory, _) = holding_factory();
        let mut tracker = FaceTracker::new(every_frame_config(), factory);
        let spot = Rect::new(50, 50, 60, 60);
        let mut detector =
            ScriptedDetector::new(vec![vec![spot], vec![], vec![spot]]);

        let first = tracker.process(&frame(0), &mut detector);
        let gone = tracker.process(&frame(1), &mut detector);
        let back = tracker.process(&frame(2), &mut detector);

        assert_eq!(first.len(), 1);
        assert!(gone.is_empty());
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].id, first[0].id);
    }

    #[test]
    fn test_memory_expires_after_timeout() {
        let (factory, _) = holding_factory();
        let config = TrackerConfig {
            detection_interval: Duration::ZERO,
            memory_timeout: Duration::from_millis(30),
            ..TrackerConfig::default()
        };
        let mut tracker = FaceTracker::new(config, factory);
        let spot = Rect::new(50, 50, 60, 60);
        let mut detector =
            ScriptedDetector::new(vec![vec![spot], vec![], vec![spot]]);

        let first = tracker.process(&frame(0), &mut detector);
        tracker.process(&frame(1), &mut detector);
        std::thread::sleep(Duration::from_millis(50));
        let back = tracker.process(&frame(2), &mut detector);

        assert_ne!(back[0].id, first[0].id);
    }

    #[test]
    fn test_failed_primitive_drops_track_silently() {
        let (factory, fail) = holding_factory();
        let config = TrackerConfig {
            detection_interval: Duration::from_secs(3600),
            ..TrackerConfig::default()
        };
        let mut tracker = FaceTracker::new(config, factory);
        let mut detector = ScriptedDetector::new(vec![vec![Rect::new(50, 50, 60, 60)]]);

        let first = tracker.process(&frame(0), &mut detector);
        assert_eq!(first.len(), 1);

        *fail.borrow_mut() = true;
        let second = tracker.process(&frame(1), &mut detector);
        assert!(second.is_empty());
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_degenerate_detections_filtered() {
        let (factory, _) = holding_factory();
        let mut tracker = FaceTracker::new(every_frame_config(), factory);
        let mut detector = ScriptedDetector::new(vec![vec![
            Rect::from_corners(30, 30, 30, 80), // zero width
            Rect::from_corners(10, 10, 60, 60),
        ]]);

        let faces = tracker.process(&frame(0), &mut detector);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].region, Rect::new(10, 10, 50, 50));
    }

    #[test]
    fn test_reset_restarts_id_counter() {
        let (factory, _) = holding_factory();
        let mut tracker = FaceTracker::new(every_frame_config(), factory);
        let mut detector = ScriptedDetector::new(vec![vec![Rect::new(10, 10, 40, 40)]]);

        let before = tracker.process(&frame(0), &mut detector);
        assert_eq!(before[0].id, 0);

        tracker.reset();
        let mut far = ScriptedDetector::new(vec![vec![Rect::new(200, 200, 40, 40)]]);
        let after = tracker.process(&frame(1), &mut far);
        assert_eq!(after[0].id, 0);
    }

    #[test]
    fn test_tie_break_prefers_lowest_id() {
        // Two remembered boxes at the same spot (one active, one lost)
        // cannot happen via the public API, so exercise assign_ids directly
        // with two candidates of equal IoU.
        let now = Instant::now();
        let remembered = vec![
            RememberedBox { id: 4, region: Rect::new(0, 0, 10, 10), lost_at: now },
            RememberedBox { id: 1, region: Rect::new(0, 0, 10, 10), lost_at: now },
        ];
        let boxes = vec![Rect::new(1, 1, 10, 10)];

        let assigned = assign_ids(&boxes, &remembered, 0.15);
        assert_eq!(assigned[0], Some(1), "lowest id wins the tie");
    }

    #[test]
    fn test_crossing_assignment_is_greedy_by_iou() {
        let now = Instant::now();
        let remembered = vec![
            RememberedBox { id: 0, region: Rect::new(0, 0, 40, 40), lost_at: now },
            RememberedBox { id: 1, region: Rect::new(30, 0, 40, 40), lost_at: now },
        ];
        // Detection 0 sits on remembered 1, detection 1 on remembered 0.
        let boxes = vec![Rect::new(32, 0, 40, 40), Rect::new(2, 0, 40, 40)];

        let assigned = assign_ids(&boxes, &remembered, 0.15);
        assert_eq!(assigned[0], Some(1));
        assert_eq!(assigned[1], Some(0));
    }
}
