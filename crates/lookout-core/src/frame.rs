//! Captured camera frame and face-crop extraction.

use crate::geometry::Rect;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("pixel buffer length mismatch: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A captured RGB camera frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Packed RGB8 pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let expected = (width * height * 3) as usize;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence,
        })
    }

    /// Extract the pixels under `region` as an owned image.
    ///
    /// The region is clamped to frame bounds first; `None` means there was
    /// nothing left to crop.
    pub fn crop(&self, region: Rect) -> Option<RgbImage> {
        let region = region.clamp_to(self.width, self.height)?;
        let (w, h) = (region.width as u32, region.height as u32);
        let row_bytes = (w * 3) as usize;

        let mut out = vec![0u8; row_bytes * h as usize];
        for row in 0..h {
            let src_y = region.y as u32 + row;
            let src_start = ((src_y * self.width + region.x as u32) * 3) as usize;
            let dst_start = row as usize * row_bytes;
            out[dst_start..dst_start + row_bytes]
                .copy_from_slice(&self.data[src_start..src_start + row_bytes]);
        }
        RgbImage::from_raw(w, h, out)
    }
}
