use crate::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::collections::VecDeque;
use std::io::Cursor;

/// A raw video frame as produced by a camera backend (RGB8, interleaved).
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Interleaved RGB pixel data, row-major
    pub pixels: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp in milliseconds since the stream started
    pub timestamp_ms: u64,
}

/// A frame after downscale and JPEG compression, ready for submission.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// JPEG bytes
    pub jpeg: Vec<u8>,
    /// When the sample was taken
    pub captured_at: DateTime<Utc>,
}

impl EncodedFrame {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.jpeg)
    }
}

/// Renders raw frames into a fixed off-screen buffer and compresses them.
///
/// The output size is fixed regardless of the camera's native resolution so
/// payload sizes stay predictable. Downscale is nearest-neighbour decimation.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn encode(&self, frame: &RawFrame) -> Result<EncodedFrame> {
        if frame.width == 0 || frame.height == 0 {
            return Err(Error::Capture("empty frame".to_string()));
        }
        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.pixels.len() < expected {
            return Err(Error::Capture(format!(
                "short frame: {} bytes for {}x{}",
                frame.pixels.len(),
                frame.width,
                frame.height
            )));
        }

        let scaled = self.downscale(frame);

        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), self.quality);
        encoder
            .encode(&scaled, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| Error::Capture(format!("jpeg encode failed: {}", e)))?;

        Ok(EncodedFrame {
            jpeg,
            captured_at: Utc::now(),
        })
    }

    /// Nearest-neighbour resample into the fixed target buffer.
    fn downscale(&self, frame: &RawFrame) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);

        for y in 0..self.height {
            let src_y = (y as u64 * frame.height as u64 / self.height as u64) as u32;
            for x in 0..self.width {
                let src_x = (x as u64 * frame.width as u64 / self.width as u64) as u32;
                let idx = ((src_y * frame.width + src_x) * 3) as usize;
                out.extend_from_slice(&frame.pixels[idx..idx + 3]);
            }
        }

        out
    }
}

/// Sliding window of the most recent sampled frames.
///
/// Bounded: pushing beyond capacity evicts the oldest entry, so the window
/// always holds the `cap` most recent samples.
#[derive(Debug)]
pub struct FrameWindow {
    frames: VecDeque<EncodedFrame>,
    cap: usize,
}

impl FrameWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, frame: EncodedFrame) {
        if self.frames.len() == self.cap {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Take all frames out of the window, oldest first.
    pub fn drain(&mut self) -> Vec<EncodedFrame> {
        self.frames.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
