use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Pixel layout of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// 8-bit RGBA, row-major
    Rgba8,
    /// 8-bit RGB, row-major
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Rgba8 => 4,
            FrameFormat::Rgb24 => 3,
        }
    }
}

/// One decoded image from the live stream.
///
/// `current_time` is the media position of the frame within the stream. It
/// only advances when the stream presents a new image, so two reads with the
/// same `current_time` refer to the same picture.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded pixel data (shared ownership, frames are read-only)
    pub data: Arc<Vec<u8>>,
    /// Natural width in pixels
    pub width: u32,
    /// Natural height in pixels
    pub height: u32,
    /// Media position of this frame
    pub current_time: Duration,
    /// Wall-clock capture time
    pub captured_at: SystemTime,
    pub format: FrameFormat,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        current_time: Duration,
        format: FrameFormat,
    ) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
            current_time,
            captured_at: SystemTime::now(),
            format,
        }
    }

    /// A frame whose metadata has not arrived yet
    pub fn unready() -> Self {
        Self::new(Vec::new(), 0, 0, Duration::ZERO, FrameFormat::Rgba8)
    }

    /// Both natural dimensions are known
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Expected buffer size for the frame's format
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }
}
