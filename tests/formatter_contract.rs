use std::time::{Duration, UNIX_EPOCH};

use serde_json::Value;

use vision_relay::detect::{BoundingBox, Detection, DetectionResult};
use vision_relay::format::{
    ClassNaming, CountFormatter, DetectionCountFormatter, Encoding, FacesFormatter,
    FullJsonFormatter, MessageFormatter,
};
use vision_relay::{ClassNameMapping, ClassSelection};

const TS: u64 = 1_717_171_717;

fn det(class_id: i32, name: &str, confidence: f32) -> Detection {
    Detection::new(class_id, name, confidence, BoundingBox::new(10, 20, 110, 220))
}

fn result(detections: Vec<Detection>) -> DetectionResult {
    DetectionResult::new(detections, UNIX_EPOCH + Duration::from_secs(TS)).with_threshold(0.25)
}

fn scenario_detections() -> Vec<Detection> {
    vec![
        det(0, "person", 0.9),
        det(1, "bicycle", 0.7),
        det(0, "person", 0.8),
        det(2, "car", 0.85),
    ]
}

fn all_formatters() -> Vec<Box<dyn MessageFormatter>> {
    vec![
        Box::new(CountFormatter::json()),
        Box::new(CountFormatter::flat()),
        Box::new(CountFormatter::json().with_naming(ClassNaming::FromResult)),
        Box::new(CountFormatter::flat().with_naming(ClassNaming::FromResult)),
        Box::new(FullJsonFormatter::new(false)),
        Box::new(FullJsonFormatter::new(true)),
        Box::new(FacesFormatter::new(Encoding::Json)),
        Box::new(FacesFormatter::new(Encoding::Flat)),
        Box::new(DetectionCountFormatter::new(Encoding::Flat)),
    ]
}

fn parse(json: &str) -> Value {
    serde_json::from_str(json).expect("formatter output is JSON")
}

#[test]
fn selected_counts_exclude_unselected_classes() {
    let r = result(scenario_detections()).with_selection(ClassSelection::only([0, 2]));
    let out = CountFormatter::json().format_message(&r);
    let v = parse(&out);

    assert_eq!(v["person"], 2);
    assert_eq!(v["car"], 1);
    assert!(v.get("bicycle").is_none());
    assert_eq!(v["timestamp"], TS);
}

#[test]
fn empty_selection_counts_every_class() {
    let r = result(scenario_detections());
    let v = parse(&CountFormatter::json().format_message(&r));

    assert_eq!(v["person"], 2);
    assert_eq!(v["bicycle"], 1);
    assert_eq!(v["car"], 1);
}

#[test]
fn mapped_names_replace_canonical_names() {
    let mapping = ClassNameMapping::new()
        .with("person", "people")
        .with("car", "vehicle");
    let r = result(vec![
        det(0, "person", 0.9),
        det(2, "car", 0.6),
        det(7, "truck", 0.5),
    ])
    .with_selection(ClassSelection::only([0, 2, 7]))
    .with_mapping(mapping);

    for formatter in [
        CountFormatter::json().with_naming(ClassNaming::FromResult),
        CountFormatter::flat().with_naming(ClassNaming::FromResult),
    ] {
        let out = formatter.format_message(&r);
        assert!(!out.contains("person"), "{out}");
        assert!(!out.contains("car"), "{out}");
        assert!(out.contains("people"), "{out}");
    }

    let v = parse(
        &CountFormatter::json()
            .with_naming(ClassNaming::FromResult)
            .format_message(&r),
    );
    assert_eq!(v["people"], 1);
    assert_eq!(v["vehicle"], 1);
    assert_eq!(v["truck"], 1);
}

#[test]
fn empty_flat_message_has_stable_person_schema() {
    let r = result(Vec::new()).with_selection(ClassSelection::only([0]));
    assert_eq!(
        CountFormatter::flat().format_message(&r),
        format!("person:0!!timestamp:{}", TS)
    );
}

#[test]
fn sentinel_detections_never_surface() {
    let r = result(vec![
        det(0, "person", 0.0),
        det(-1, "ghost", 0.9),
        det(2, "car", -1.0),
        det(3, "motorcycle", f32::NAN),
    ]);

    for formatter in all_formatters() {
        let out = formatter.format_message(&r);
        assert!(!out.contains("ghost"), "{out}");
        assert!(!out.contains("car"), "{out}");
        assert!(!out.contains("motorcycle"), "{out}");
    }
    assert_eq!(FullJsonFormatter::new(true).format_message(&r), "");
    assert_eq!(
        DetectionCountFormatter::default().format_message(&r),
        format!("detection_count:0!!timestamp:{}", TS)
    );
    assert_eq!(parse(&CountFormatter::json().format_message(&r))["person"], 0);
}

#[test]
fn empty_selection_equals_listing_every_present_class() {
    let dets = scenario_detections();
    let implicit = result(dets.clone());
    let explicit = result(dets).with_selection(ClassSelection::only([0, 1, 2]));

    for formatter in all_formatters() {
        assert_eq!(
            formatter.format_message(&implicit),
            formatter.format_message(&explicit)
        );
    }
}

#[test]
fn formatting_is_idempotent() {
    let r = result(scenario_detections())
        .with_selection(ClassSelection::only([0, 2]))
        .with_mapping(ClassNameMapping::new().with("person", "faces"));

    for formatter in all_formatters() {
        let first = formatter.format_message(&r);
        let second = formatter.format_message(&r);
        assert_eq!(first, second);
    }
}

#[test]
fn full_document_lists_selected_detections() {
    let r = result(scenario_detections()).with_selection(ClassSelection::only([2]));
    let v = parse(&FullJsonFormatter::new(false).format_message(&r));

    assert_eq!(v["detection_count"], 1);
    let first = &v["detections"][0];
    assert_eq!(first["class_id"], 2);
    assert_eq!(first["class_name"], "car");
    assert_eq!(first["bbox"]["left"], 10);
    assert_eq!(first["bbox"]["bottom"], 220);
}
