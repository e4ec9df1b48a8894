#![cfg(feature = "backend-tract")]

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, MAX_DETECTIONS};
use crate::frame::Frame;

/// IoU above which overlapping boxes of the same class are suppressed.
pub const NMS_THRESHOLD: f32 = 0.45;

const LETTERBOX_FILL: u8 = 114;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single output of shape `[1, 4 + classes, anchors]` (or its
/// transpose) with centre-format boxes in model input pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    class_names: Vec<String>,
}

struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            class_names,
        })
    }

    fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    fn build_input(&self, frame: &Frame) -> Result<(Tensor, Letterbox)> {
        let image = frame
            .to_rgb_image()
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let scale = (self.width as f32 / frame.width as f32)
            .min(self.height as f32 / frame.height as f32);
        let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, self.width);
        let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, self.height);
        let resized = imageops::resize(&image, new_w, new_h, FilterType::Triangle);

        let pad_x = (self.width - new_w) / 2;
        let pad_y = (self.height - new_h) / 2;
        let mut canvas = RgbImage::from_pixel(self.width, self.height, Rgb([LETTERBOX_FILL; 3]));
        imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| canvas.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok((
            input.into_tensor(),
            Letterbox {
                scale,
                pad_x: pad_x as f32,
                pad_y: pad_y as f32,
            },
        ))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        letterbox: &Letterbox,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let channels_first = shape[1] < shape[2];
        let (channels, anchors) = if channels_first {
            (shape[1], shape[2])
        } else {
            (shape[2], shape[1])
        };
        if channels <= 4 {
            return Err(anyhow!("model output has no class scores: {:?}", shape));
        }
        let at = |c: usize, a: usize| {
            if channels_first {
                view[[0, c, a]]
            } else {
                view[[0, a, c]]
            }
        };

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class_id, score) = (4..channels)
                .map(|c| (c - 4, at(c, a)))
                .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(Ordering::Equal))
                .unwrap_or((0, 0.0));
            if score < confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (at(0, a), at(1, a), at(2, a), at(3, a));
            let to_frame_x = |v: f32| {
                ((v - letterbox.pad_x) / letterbox.scale).clamp(0.0, frame.width as f32 - 1.0)
            };
            let to_frame_y = |v: f32| {
                ((v - letterbox.pad_y) / letterbox.scale).clamp(0.0, frame.height as f32 - 1.0)
            };
            candidates.push(Candidate {
                class_id,
                score,
                x1: to_frame_x(cx - w / 2.0),
                y1: to_frame_y(cy - h / 2.0),
                x2: to_frame_x(cx + w / 2.0),
                y2: to_frame_y(cy + h / 2.0),
            });
        }

        Ok(non_max_suppression(candidates, NMS_THRESHOLD)
            .into_iter()
            .take(MAX_DETECTIONS)
            .map(|c| {
                Detection::new(
                    c.class_id as i32,
                    &self.class_name(c.class_id),
                    c.score,
                    BoundingBox::new(c.x1 as i32, c.y1 as i32, c.x2 as i32, c.y2 as i32),
                )
            })
            .collect())
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    class_id: usize,
    score: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Class-aware greedy NMS, highest score first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let mut suppressed = vec![false; candidates.len()];
    let mut kept = Vec::new();
    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(candidates[i]);
        for j in (i + 1)..candidates.len() {
            if candidates[i].class_id == candidates[j].class_id
                && candidates[i].iou(&candidates[j]) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let (input, letterbox) = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, &letterbox, frame, confidence_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(class_id: usize, score: f32, x1: f32) -> Candidate {
        Candidate {
            class_id,
            score,
            x1,
            y1: 0.0,
            x2: x1 + 10.0,
            y2: 10.0,
        }
    }

    #[test]
    fn nms_suppresses_same_class_overlaps_only() {
        let kept = non_max_suppression(
            vec![cand(0, 0.6, 1.0), cand(0, 0.9, 0.0), cand(2, 0.8, 0.0)],
            NMS_THRESHOLD,
        );
        let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.8]);
    }
}
