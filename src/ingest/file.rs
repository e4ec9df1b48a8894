//! Still image frame source.
//!
//! `ImageFileSource` decodes a local image (JPEG or PNG) into an RGB8 frame.
//! It backs single-shot mode: the worker asks for exactly one frame.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

pub struct ImageFileSource {
    path: PathBuf,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_count: 0,
            last_error: None,
        }
    }
}

impl FrameSource for ImageFileSource {
    fn connect(&mut self) -> Result<()> {
        if !self.path.is_file() {
            return Err(anyhow!("image file {} does not exist", self.path.display()));
        }
        log::info!("ImageFileSource: opened {}", self.path.display());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let image = image::open(&self.path)
            .with_context(|| format!("decode image {}", self.path.display()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?;
        self.frame_count += 1;
        self.last_error = None;
        Ok(Frame::from_image(image))
    }

    fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.path.display().to_string(),
        }
    }
}
