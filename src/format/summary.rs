use super::{encode_fields, Encoding, MessageFormatter};
use crate::detect::DetectionResult;
use crate::filter::{select_detections, PERSON_CLASS_ID};

/// Attention summary for face-counting consumers: `faces_in_frame_total`
/// and `faces_attending`, both the number of selected person detections.
#[derive(Clone, Debug)]
pub struct FacesFormatter {
    encoding: Encoding,
}

impl FacesFormatter {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }
}

impl MessageFormatter for FacesFormatter {
    fn format_message(&self, result: &DetectionResult) -> String {
        let people = select_detections(result)
            .filter(|d| d.class_id == PERSON_CLASS_ID)
            .count() as u64;
        encode_fields(
            self.encoding,
            [
                ("faces_in_frame_total".to_string(), people),
                ("faces_attending".to_string(), people),
            ],
            result.timestamp_secs(),
        )
    }
}

/// Total number of selected detections, e.g. `detection_count:3!!timestamp:T`.
#[derive(Clone, Debug)]
pub struct DetectionCountFormatter {
    encoding: Encoding,
}

impl DetectionCountFormatter {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }
}

impl Default for DetectionCountFormatter {
    fn default() -> Self {
        Self::new(Encoding::Flat)
    }
}

impl MessageFormatter for DetectionCountFormatter {
    fn format_message(&self, result: &DetectionResult) -> String {
        let total = select_detections(result).count() as u64;
        encode_fields(
            self.encoding,
            [("detection_count".to_string(), total)],
            result.timestamp_secs(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};
    use crate::filter::ClassSelection;
    use std::time::{Duration, UNIX_EPOCH};

    fn result() -> DetectionResult {
        let bbox = BoundingBox::new(0, 0, 4, 4);
        DetectionResult::new(
            vec![
                Detection::new(0, "person", 0.9, bbox),
                Detection::new(0, "person", 0.0, bbox),
                Detection::new(0, "person", 0.6, bbox),
                Detection::new(2, "car", 0.6, bbox),
            ],
            UNIX_EPOCH + Duration::from_secs(5),
        )
    }

    #[test]
    fn faces_count_valid_people_only() {
        let out = FacesFormatter::new(Encoding::Flat).format_message(&result());
        assert_eq!(out, "faces_in_frame_total:2!!faces_attending:2!!timestamp:5");
    }

    #[test]
    fn detection_count_honors_selection() {
        let formatter = DetectionCountFormatter::default();
        assert_eq!(formatter.format_message(&result()), "detection_count:3!!timestamp:5");
        let cars = result().with_selection(ClassSelection::only([2]));
        assert_eq!(formatter.format_message(&cars), "detection_count:1!!timestamp:5");
    }
}
