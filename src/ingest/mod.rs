//! Frame ingestion sources.
//!
//! This module provides the sources the inference worker pulls frames from:
//! - Still image files (single-shot mode)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Synthetic `stub://` camera (testing and dry runs)
//!
//! Sources are owned by the inference thread and never shared. Capture
//! failures surface as `Err` from `next_frame`; the caller decides whether to
//! retry.

pub mod file;
#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use file::ImageFileSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Prefix that marks a live capture device.
pub const DEVICE_PREFIX: &str = "/dev/video";
/// Prefix that marks the synthetic camera.
pub const SYNTHETIC_PREFIX: &str = "stub://";

/// A producer of frames.
pub trait FrameSource: Send {
    /// Open the underlying device or file. Failure is a startup error.
    fn connect(&mut self) -> Result<()>;

    /// Capture or load the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// How a source descriptor is interpreted. Decides the producer mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Live capture device, e.g. `/dev/video0`. Continuous mode.
    Device(String),
    /// Synthetic camera (`stub://...`). Continuous mode.
    Synthetic(String),
    /// Still image on disk. Single-shot mode.
    ImageFile(String),
}

impl SourceKind {
    pub fn detect(source: &str) -> Result<Self> {
        if source.starts_with(DEVICE_PREFIX) {
            return Ok(Self::Device(source.to_string()));
        }
        if source.starts_with(SYNTHETIC_PREFIX) {
            return Ok(Self::Synthetic(source.to_string()));
        }
        if Path::new(source).is_file() {
            return Ok(Self::ImageFile(source.to_string()));
        }
        Err(anyhow!(
            "source {} is neither a {}* device nor an existing image file",
            source,
            DEVICE_PREFIX
        ))
    }

    /// True when the producer loops until shutdown.
    pub fn is_continuous(&self) -> bool {
        !matches!(self, Self::ImageFile(_))
    }

    pub fn descriptor(&self) -> &str {
        match self {
            Self::Device(s) | Self::Synthetic(s) | Self::ImageFile(s) => s,
        }
    }
}

/// Build (but do not connect) the source for `kind`.
pub fn open_source(kind: &SourceKind, target_fps: u32) -> Result<Box<dyn FrameSource>> {
    match kind {
        SourceKind::ImageFile(path) => Ok(Box::new(ImageFileSource::new(path))),
        SourceKind::Synthetic(url) => Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            url: url.clone(),
            ..SyntheticConfig::default()
        }))),
        #[cfg(feature = "ingest-v4l2")]
        SourceKind::Device(device) => Ok(Box::new(V4l2Source::new(V4l2Config {
            device: device.clone(),
            target_fps,
            ..V4l2Config::default()
        }))),
        #[cfg(not(feature = "ingest-v4l2"))]
        SourceKind::Device(device) => {
            let _ = target_fps;
            Err(anyhow!(
                "capture device {} requires the ingest-v4l2 feature",
                device
            ))
        }
    }
}
