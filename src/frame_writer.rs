//! Decorated frame output.
//!
//! Which boxes get drawn is decided by [`plan_decoration`], which goes
//! through the same [`select_detections`] rule as the formatters. Drawing
//! and encoding only follow the plan.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detect::{BoundingBox, DetectionResult};
use crate::filter::select_detections;
use crate::frame::Frame;

pub const COLOR_CONFIDENT: Rgb<u8> = Rgb([0, 255, 0]);
pub const COLOR_UNCERTAIN: Rgb<u8> = Rgb([255, 191, 0]);
pub const COLOR_NO_DETECTIONS: Rgb<u8> = Rgb([255, 0, 0]);

/// Consumer of (frame, result) pairs, called once per inference cycle.
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &Frame, result: &DetectionResult) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxTone {
    /// Confidence at or above the result's threshold.
    Confident,
    Uncertain,
}

impl BoxTone {
    pub fn color(self) -> Rgb<u8> {
        match self {
            Self::Confident => COLOR_CONFIDENT,
            Self::Uncertain => COLOR_UNCERTAIN,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecoratedBox {
    pub class_id: i32,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub tone: BoxTone,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decoration {
    /// Draw these boxes (possibly none) over the frame.
    Boxes(Vec<DecoratedBox>),
    /// Nothing selected and empty output is suppressed: draw the marker.
    NoDetections,
}

/// Decide what to draw for `result` on a `width` x `height` frame.
///
/// Boxes that fail the selection rule are never drawn. Selected boxes that
/// fall outside the frame or are degenerate are skipped with a warning.
pub fn plan_decoration(
    result: &DetectionResult,
    width: u32,
    height: u32,
    suppress_empty: bool,
) -> Decoration {
    let mut selected = 0usize;
    let mut boxes = Vec::new();
    for detection in select_detections(result) {
        selected += 1;
        if !detection.bbox.fits_within(width, height) {
            log::warn!(
                "frame writer: skipping {} box {:?} outside {}x{} frame",
                detection.class_name,
                detection.bbox,
                width,
                height
            );
            continue;
        }
        let tone = if detection.confidence >= result.confidence_threshold {
            BoxTone::Confident
        } else {
            BoxTone::Uncertain
        };
        boxes.push(DecoratedBox {
            class_id: detection.class_id,
            class_name: detection.class_name.clone(),
            confidence: detection.confidence,
            bbox: detection.bbox,
            tone,
        });
    }
    if suppress_empty && selected == 0 {
        return Decoration::NoDetections;
    }
    Decoration::Boxes(boxes)
}

/// Apply a decoration plan to an image in place.
pub fn render_decoration(image: &mut RgbImage, decoration: &Decoration) {
    match decoration {
        Decoration::Boxes(boxes) => {
            for b in boxes {
                let rect = Rect::at(b.bbox.left, b.bbox.top)
                    .of_size(b.bbox.width() as u32, b.bbox.height() as u32);
                draw_hollow_rect_mut(image, rect, b.tone.color());
                if b.bbox.width() > 2 && b.bbox.height() > 2 {
                    let inner = Rect::at(b.bbox.left + 1, b.bbox.top + 1)
                        .of_size(b.bbox.width() as u32 - 2, b.bbox.height() as u32 - 2);
                    draw_hollow_rect_mut(image, inner, b.tone.color());
                }
            }
        }
        Decoration::NoDetections => {
            let (w, h) = image.dimensions();
            if w == 0 || h == 0 {
                return;
            }
            draw_hollow_rect_mut(image, Rect::at(0, 0).of_size(w, h), COLOR_NO_DETECTIONS);
            let (right, bottom) = ((w - 1) as f32, (h - 1) as f32);
            draw_line_segment_mut(image, (0.0, 0.0), (right, bottom), COLOR_NO_DETECTIONS);
            draw_line_segment_mut(image, (right, 0.0), (0.0, bottom), COLOR_NO_DETECTIONS);
        }
    }
}

/// Temp sibling that keeps the extension, e.g. `out.jpg` -> `out.tmp.jpg`.
/// A path without an extension gets `.tmp.jpg`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.tmp.{}", stem, ext.to_string_lossy()),
        None => format!("{}.tmp.jpg", stem),
    };
    path.with_file_name(name)
}

/// Encoder for the output path. Unknown or missing extensions encode JPEG.
pub fn output_format_for(path: &Path) -> ImageFormat {
    ImageFormat::from_path(path).unwrap_or(ImageFormat::Jpeg)
}

/// Draws boxes over the frame and replaces the output image atomically.
pub struct DecoratedFrameWriter {
    output_path: PathBuf,
    suppress_empty: bool,
    frames_written: u64,
}

impl DecoratedFrameWriter {
    pub fn new(output_path: impl Into<PathBuf>, suppress_empty: bool) -> Self {
        Self {
            output_path: output_path.into(),
            suppress_empty,
            frames_written: 0,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn save_atomic(&self, image: &RgbImage) -> Result<()> {
        if let Some(dir) = self.output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create output directory {}", dir.display()))?;
        }
        let tmp = temp_path_for(&self.output_path);
        if let Err(err) = image.save_with_format(&tmp, output_format_for(&self.output_path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(anyhow!("encode {}: {}", tmp.display(), err));
        }
        std::fs::rename(&tmp, &self.output_path).with_context(|| {
            format!(
                "rename {} into {}",
                tmp.display(),
                self.output_path.display()
            )
        })
    }
}

impl FrameWriter for DecoratedFrameWriter {
    fn write_frame(&mut self, frame: &Frame, result: &DetectionResult) -> Result<()> {
        let mut image = frame
            .to_rgb_image()
            .ok_or_else(|| anyhow!("no pixels to decorate"))?;
        let decoration = plan_decoration(result, frame.width, frame.height, self.suppress_empty);
        render_decoration(&mut image, &decoration);
        self.save_atomic(&image)?;
        self.frames_written += 1;
        log::debug!(
            "frame writer: wrote {} ({} boxes)",
            self.output_path.display(),
            match &decoration {
                Decoration::Boxes(boxes) => boxes.len(),
                Decoration::NoDetections => 0,
            }
        );
        Ok(())
    }
}
