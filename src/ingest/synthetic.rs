//! Synthetic camera (`stub://` sources).
//!
//! Produces a moving gradient so continuous mode can run end to end without
//! hardware. Paired with the stub detector in tests and dry runs.

use anyhow::Result;

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Fail every Nth capture (0 = never). Exercises the retry path.
    pub fail_every: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 640,
            height: 480,
            fail_every: 0,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    attempts: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            attempts: 0,
            scene_state: 0,
        }
    }

    /// Scene changes every 50 frames so consecutive frames differ.
    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let offset = self.frame_count + self.scene_state as u64;
        (0..pixel_count)
            .map(|i| ((i as u64 + offset) % 256) as u8)
            .collect()
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.attempts += 1;
        if self.config.fail_every > 0 && self.attempts % self.config.fail_every == 0 {
            anyhow::bail!("synthetic capture failure on attempt {}", self.attempts);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::from_rgb(pixels, self.config.width, self.config.height)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SyntheticConfig {
        SyntheticConfig {
            width: 16,
            height: 8,
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn produces_frames_of_configured_size() -> Result<()> {
        let mut source = SyntheticSource::new(small());
        source.connect()?;
        let frame = source.next_frame()?;
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(frame.byte_len(), 16 * 8 * 3);
        Ok(())
    }

    #[test]
    fn consecutive_frames_differ() -> Result<()> {
        let mut source = SyntheticSource::new(small());
        let a = source.next_frame()?;
        let b = source.next_frame()?;
        assert_ne!(a.pixels(), b.pixels());
        Ok(())
    }

    #[test]
    fn scheduled_failures_do_not_count_as_frames() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            fail_every: 2,
            ..small()
        });
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_err());
        assert!(source.next_frame().is_ok());
        assert_eq!(source.stats().frames_captured, 2);
    }
}
