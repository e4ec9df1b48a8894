use serde::Serialize;

use super::MessageFormatter;
use crate::detect::{BoundingBox, DetectionResult};
use crate::filter::select_detections;

#[derive(Serialize)]
struct FullDocument<'a> {
    detections: Vec<DetectionRecord<'a>>,
    detection_count: usize,
    timestamp: u64,
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
    class_id: i32,
    class_name: &'a str,
    confidence: f32,
    bbox: BoundingBox,
}

/// Every selected detection with class, confidence and box.
///
/// With `suppress_empty` a result with no selected detections formats to the
/// empty string and the publisher sends nothing.
#[derive(Clone, Debug, Default)]
pub struct FullJsonFormatter {
    suppress_empty: bool,
}

impl FullJsonFormatter {
    pub fn new(suppress_empty: bool) -> Self {
        Self { suppress_empty }
    }
}

impl MessageFormatter for FullJsonFormatter {
    fn format_message(&self, result: &DetectionResult) -> String {
        let detections: Vec<DetectionRecord<'_>> = select_detections(result)
            .map(|d| DetectionRecord {
                class_id: d.class_id,
                class_name: &d.class_name,
                confidence: d.confidence,
                bbox: d.bbox,
            })
            .collect();
        if self.suppress_empty && detections.is_empty() {
            return String::new();
        }
        let document = FullDocument {
            detection_count: detections.len(),
            detections,
            timestamp: result.timestamp_secs(),
        };
        match serde_json::to_string(&document) {
            Ok(json) => json,
            Err(err) => {
                // Non-finite confidences are the only way serialization can fail.
                log::warn!("FullJsonFormatter: serialization failed: {}", err);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::filter::ClassSelection;
    use std::time::{Duration, UNIX_EPOCH};

    fn result(dets: Vec<Detection>) -> DetectionResult {
        DetectionResult::new(dets, UNIX_EPOCH + Duration::from_secs(100))
    }

    #[test]
    fn emits_selected_detections_with_boxes() {
        let r = result(vec![
            Detection::new(0, "person", 0.5, BoundingBox::new(1, 2, 3, 4)),
            Detection::new(1, "bicycle", 0.75, BoundingBox::new(5, 6, 7, 8)),
        ])
        .with_selection(ClassSelection::only([0]));
        let out = FullJsonFormatter::new(false).format_message(&r);
        assert_eq!(
            out,
            r#"{"detections":[{"class_id":0,"class_name":"person","confidence":0.5,"bbox":{"left":1,"top":2,"right":3,"bottom":4}}],"detection_count":1,"timestamp":100}"#
        );
    }

    #[test]
    fn suppress_empty_yields_nothing() {
        let r = result(vec![Detection::new(-1, "", 0.0, BoundingBox::default())]);
        assert_eq!(FullJsonFormatter::new(true).format_message(&r), "");
        let out = FullJsonFormatter::new(false).format_message(&r);
        assert_eq!(out, r#"{"detections":[],"detection_count":0,"timestamp":100}"#);
    }
}
