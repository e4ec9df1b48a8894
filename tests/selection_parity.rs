use std::time::SystemTime;

use serde_json::Value;

use vision_relay::detect::{BoundingBox, Detection, DetectionResult};
use vision_relay::format::{FullJsonFormatter, MessageFormatter};
use vision_relay::frame_writer::{plan_decoration, Decoration};
use vision_relay::ClassSelection;

fn mixed_result(selection: ClassSelection) -> DetectionResult {
    let bbox = BoundingBox::new(5, 5, 40, 40);
    DetectionResult::new(
        vec![
            Detection::new(0, "person", 0.9, bbox),
            Detection::new(1, "bicycle", 0.2, bbox),
            Detection::new(2, "car", 0.0, bbox),
            Detection::new(-1, "", 0.8, bbox),
            Detection::new(2, "car", 0.7, bbox),
            Detection::new(7, "truck", 0.3, bbox),
        ],
        SystemTime::now(),
    )
    .with_selection(selection)
    .with_threshold(0.5)
}

fn drawn(result: &DetectionResult) -> Vec<(i32, u32)> {
    match plan_decoration(result, 64, 64, false) {
        Decoration::Boxes(boxes) => boxes
            .iter()
            .map(|b| (b.class_id, (b.confidence * 100.0).round() as u32))
            .collect(),
        Decoration::NoDetections => Vec::new(),
    }
}

fn published(result: &DetectionResult) -> Vec<(i32, u32)> {
    let doc: Value =
        serde_json::from_str(&FullJsonFormatter::new(false).format_message(result)).unwrap();
    doc["detections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| {
            (
                d["class_id"].as_i64().unwrap() as i32,
                (d["confidence"].as_f64().unwrap() * 100.0).round() as u32,
            )
        })
        .collect()
}

#[test]
fn decorator_and_formatter_surface_the_same_detections() {
    for selection in [
        ClassSelection::all(),
        ClassSelection::only([0]),
        ClassSelection::only([2, 7]).with_person(),
        ClassSelection::only([42]),
    ] {
        let result = mixed_result(selection);
        assert_eq!(drawn(&result), published(&result));
    }
}

#[test]
fn below_threshold_detections_are_drawn_not_dropped() {
    let result = mixed_result(ClassSelection::all());
    assert_eq!(
        drawn(&result),
        vec![(0, 90), (1, 20), (2, 70), (7, 30)]
    );
}

#[test]
fn suppressed_empty_frame_gets_marker() {
    let result = mixed_result(ClassSelection::only([42]));
    assert_eq!(plan_decoration(&result, 64, 64, true), Decoration::NoDetections);
    assert_eq!(FullJsonFormatter::new(true).format_message(&result), "");
}
