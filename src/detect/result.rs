use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::filter::{ClassNameMapping, ClassSelection};

/// Maximum number of detection slots produced for a single frame.
pub const MAX_DETECTIONS: usize = 128;

/// Maximum length (in bytes) of a class name carried by a detection.
pub const MAX_CLASS_NAME_LEN: usize = 64;

/// Box corners in pixel coordinates of the original frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True when the box is non-degenerate and lies strictly inside a
    /// `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let (w, h) = (width as i64, height as i64);
        self.left >= 0
            && self.top >= 0
            && (self.right as i64) < w
            && (self.bottom as i64) < h
            && self.left < self.right
            && self.top < self.bottom
    }
}

/// One object instance reported by the inference engine.
///
/// A negative `class_id` or a non-positive `confidence` marks an empty slot,
/// not a real object. See [`crate::filter::is_valid_detection`].
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: i32,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: i32, class_name: &str, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            class_name: bounded_name(class_name),
            confidence,
            bbox,
        }
    }
}

fn bounded_name(name: &str) -> String {
    if name.len() <= MAX_CLASS_NAME_LEN {
        return name.to_string();
    }
    let mut end = MAX_CLASS_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Output of one inference cycle plus the filtering metadata every consumer
/// applies to it.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    /// Model output order, at most [`MAX_DETECTIONS`] entries.
    pub detections: Vec<Detection>,
    pub timestamp: SystemTime,
    /// Empty selection means every class passes.
    pub selected_classes: ClassSelection,
    pub class_name_mapping: ClassNameMapping,
    pub confidence_threshold: f32,
}

impl DetectionResult {
    pub fn new(mut detections: Vec<Detection>, timestamp: SystemTime) -> Self {
        if detections.len() > MAX_DETECTIONS {
            log::warn!(
                "dropping {} detections beyond the {} slot limit",
                detections.len() - MAX_DETECTIONS,
                MAX_DETECTIONS
            );
            detections.truncate(MAX_DETECTIONS);
        }
        Self {
            detections,
            timestamp,
            selected_classes: ClassSelection::all(),
            class_name_mapping: ClassNameMapping::default(),
            confidence_threshold: 0.0,
        }
    }

    /// Zero-detection result stamped with the current time.
    pub fn empty() -> Self {
        Self::new(Vec::new(), SystemTime::now())
    }

    pub fn with_selection(mut self, selected_classes: ClassSelection) -> Self {
        self.selected_classes = selected_classes;
        self
    }

    pub fn with_mapping(mut self, class_name_mapping: ClassNameMapping) -> Self {
        self.class_name_mapping = class_name_mapping;
        self
    }

    pub fn with_threshold(mut self, confidence_threshold: f32) -> Self {
        self.confidence_threshold = confidence_threshold;
        self
    }

    /// Capture time as whole seconds since the UNIX epoch.
    pub fn timestamp_secs(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_are_bounded() {
        let long = "x".repeat(MAX_CLASS_NAME_LEN + 20);
        let det = Detection::new(3, &long, 0.5, BoundingBox::default());
        assert_eq!(det.class_name.len(), MAX_CLASS_NAME_LEN);
    }

    #[test]
    fn detection_slots_are_bounded() {
        let dets = (0..MAX_DETECTIONS + 5)
            .map(|i| Detection::new(i as i32, "obj", 0.5, BoundingBox::default()))
            .collect();
        let result = DetectionResult::new(dets, SystemTime::now());
        assert_eq!(result.detections.len(), MAX_DETECTIONS);
        assert_eq!(result.detections[0].class_id, 0);
    }

    #[test]
    fn box_bounds_check() {
        assert!(BoundingBox::new(10, 10, 50, 50).fits_within(100, 100));
        assert!(!BoundingBox::new(10, 10, 100, 50).fits_within(100, 100));
        assert!(!BoundingBox::new(-1, 10, 50, 50).fits_within(100, 100));
        assert!(!BoundingBox::new(50, 10, 50, 50).fits_within(100, 100));
    }
}
