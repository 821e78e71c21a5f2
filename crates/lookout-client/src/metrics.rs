//! Frame-rate bookkeeping, logged periodically.

use std::time::Instant;

pub struct FrameMetrics {
    frames: u64,
    started: Instant,
    log_every: u64,
}

impl FrameMetrics {
    pub fn new(log_every: u64) -> Self {
        Self {
            frames: 0,
            started: Instant::now(),
            log_every: log_every.max(1),
        }
    }

    pub fn tick(&mut self) {
        self.frames += 1;
        if self.frames % self.log_every == 0 {
            tracing::debug!(frames = self.frames, fps = self.fps(), "frame rate");
        }
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.started = Instant::now();
    }
}
