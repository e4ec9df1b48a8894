//! Frames handed from capture to inference and decoration.
//!
//! - `Frame`: owned RGB8 pixel buffer plus capture time.
//!
//! A frame is created by a `FrameSource`, borrowed by the detector backend and
//! the frame writer, and dropped at the end of the inference cycle. It never
//! enters the result queue.

use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage};
use std::time::SystemTime;

/// Owned RGB8 frame. A zero-sized frame stands for "nothing captured".
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: SystemTime,
}

impl Frame {
    /// Wrap packed RGB8 pixels. Fails when the buffer length does not match
    /// the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            captured_at: SystemTime::now(),
        })
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            captured_at: SystemTime::now(),
        }
    }

    pub fn from_image(image: DynamicImage) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            data: rgb.into_raw(),
            width,
            height,
            captured_at: SystemTime::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Copy into an `image` buffer for drawing or resizing.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.is_empty() {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}
