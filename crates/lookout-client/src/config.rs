use lookout_core::{RecognitionConfig, RegisterConfig, TrackerConfig};
use lookout_proto::DEFAULT_QUEUE_CAPACITY;
use std::time::Duration;

/// Client configuration, loaded from environment variables.
pub struct Config {
    /// Camera identifier stamped into every outbound request.
    pub camera_id: String,
    /// Wall-clock cadence between full re-detections.
    pub detection_interval: Duration,
    /// Minimum IoU for a detection to reclaim a remembered track id.
    pub reid_iou_threshold: f32,
    /// How long a lost track stays eligible for re-identification.
    pub memory_timeout: Duration,
    /// Max center distance (px) for a face to claim a registration lock.
    pub lock_match_distance: f32,
    /// Registration lock released after this long unmatched.
    pub lock_timeout: Duration,
    /// Recognition results below this confidence are discarded.
    pub confidence_threshold: f32,
    /// Minimum spacing between recognition requests per track.
    pub send_interval: Duration,
    /// How long a confirmed identity outlives its last refresh.
    pub recognition_timeout: Duration,
    /// Max center distance (px) for position-based re-association.
    pub position_match_distance: f32,
    /// Position-cache entries older than this are dropped.
    pub position_cache_timeout: Duration,
    /// Bounded wait per inbound poll.
    pub recv_poll: Duration,
    /// Local send/receive buffer depth.
    pub queue_capacity: usize,
    /// Whether the registration channel is wired up.
    pub register_enabled: bool,
    /// Whether the recognition channel is wired up.
    pub recognition_enabled: bool,
}

impl Config {
    /// Load configuration from `LOOKOUT_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            camera_id: std::env::var("LOOKOUT_CAMERA_ID").unwrap_or_else(|_| "cam_1".to_string()),
            detection_interval: env_ms("LOOKOUT_DETECTION_INTERVAL_MS", 500),
            reid_iou_threshold: env_f32("LOOKOUT_REID_IOU_THRESHOLD", 0.15),
            memory_timeout: env_ms("LOOKOUT_MEMORY_TIMEOUT_MS", 2000),
            lock_match_distance: env_f32("LOOKOUT_LOCK_MATCH_DISTANCE", 50.0),
            lock_timeout: env_ms("LOOKOUT_LOCK_TIMEOUT_MS", 5000),
            confidence_threshold: env_f32("LOOKOUT_CONFIDENCE_THRESHOLD", 0.7),
            send_interval: env_ms("LOOKOUT_SEND_INTERVAL_MS", 1000),
            recognition_timeout: env_ms("LOOKOUT_RECOGNITION_TIMEOUT_MS", 5000),
            position_match_distance: env_f32("LOOKOUT_POSITION_MATCH_DISTANCE", 50.0),
            position_cache_timeout: env_ms("LOOKOUT_POSITION_CACHE_TIMEOUT_MS", 10000),
            recv_poll: env_ms("LOOKOUT_RECV_POLL_MS", 10),
            queue_capacity: env_usize("LOOKOUT_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            register_enabled: env_bool("LOOKOUT_REGISTER_ENABLED", true),
            recognition_enabled: env_bool("LOOKOUT_RECOGNITION_ENABLED", true),
        }
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            detection_interval: self.detection_interval,
            iou_threshold: self.reid_iou_threshold,
            memory_timeout: self.memory_timeout,
        }
    }

    pub fn register(&self) -> RegisterConfig {
        RegisterConfig {
            lock_timeout: self.lock_timeout,
            match_distance: self.lock_match_distance,
        }
    }

    pub fn recognition(&self) -> RecognitionConfig {
        RecognitionConfig {
            recognition_timeout: self.recognition_timeout,
            send_interval: self.send_interval,
            confidence_threshold: self.confidence_threshold,
            position_match_distance: self.position_match_distance,
            position_cache_timeout: self.position_cache_timeout,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_ms(key: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}
