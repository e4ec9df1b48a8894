use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Stub backend for tests and dry runs (`stub://` model paths).
///
/// Without a script it reports one person in the centre quarter of the frame
/// and one low-confidence car in the top-left corner. With a script it replays
/// the given detection lists in order, cycling at the end.
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_script(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }

    fn synthetic(frame: &Frame) -> Vec<Detection> {
        let (w, h) = (frame.width as i32, frame.height as i32);
        vec![
            Detection::new(
                0,
                "person",
                0.9,
                BoundingBox::new(w / 4, h / 4, w * 3 / 4, h * 3 / 4),
            ),
            Detection::new(2, "car", 0.3, BoundingBox::new(1, 1, w / 5, h / 5)),
        ]
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        if !self.script.is_empty() {
            let next = self.script[self.cursor % self.script.len()].clone();
            self.cursor += 1;
            return Ok(next);
        }
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Self::synthetic(frame)
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_detections_respect_threshold() {
        let mut backend = StubBackend::new();
        let frame = Frame::from_rgb(vec![0u8; 64 * 48 * 3], 64, 48).unwrap();

        let all = backend.detect(&frame, 0.25).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].bbox, BoundingBox::new(16, 12, 48, 36));

        let strict = backend.detect(&frame, 0.5).unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].class_name, "person");
    }

    #[test]
    fn script_replays_in_order() {
        let a = vec![Detection::new(1, "bicycle", 0.7, BoundingBox::default())];
        let b = Vec::new();
        let mut backend = StubBackend::with_script(vec![a.clone(), b]);
        let frame = Frame::empty();

        assert_eq!(backend.detect(&frame, 0.25).unwrap(), a);
        assert!(backend.detect(&frame, 0.25).unwrap().is_empty());
        assert_eq!(backend.detect(&frame, 0.25).unwrap(), a);
    }
}
