//! Selective filtering shared by every consumer.
//!
//! The JSON publisher, the UDP publishers and the frame decorator all decide
//! which detections to surface through [`select_detections`]. Keeping the
//! rule in one place is what guarantees they agree.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::detect::{Detection, DetectionResult};

/// COCO "person" class. Force-included whenever an explicit class filter is set.
pub const PERSON_CLASS_ID: i32 = 0;
pub const PERSON_CLASS_NAME: &str = "person";

/// Set of class IDs a run surfaces. The empty set means "all classes".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassSelection {
    ids: BTreeSet<i32>,
}

impl ClassSelection {
    /// Every class passes.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the listed classes pass. An empty iterator yields [`ClassSelection::all`].
    pub fn only<I: IntoIterator<Item = i32>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Adds the person class to an explicit filter. A selection of "all"
    /// is left untouched since person already passes.
    pub fn with_person(mut self) -> Self {
        if !self.ids.is_empty() {
            self.ids.insert(PERSON_CLASS_ID);
        }
        self
    }

    pub fn is_all(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_selected(&self, class_id: i32) -> bool {
        self.ids.is_empty() || self.ids.contains(&class_id)
    }
}

/// Canonical class name to display name, e.g. `person -> faces`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ClassNameMapping {
    names: BTreeMap<String, String>,
}

impl ClassNameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: &str, to: &str) -> Self {
        self.names.insert(from.to_string(), to.to_string());
        self
    }

    /// Mapped name, or the input unchanged when no mapping exists.
    pub fn map<'a>(&'a self, name: &'a str) -> &'a str {
        self.names.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ClassNameMapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Engine sentinel check: empty slots carry `class_id < 0` or `confidence <= 0`.
pub fn is_valid_detection(detection: &Detection) -> bool {
    detection.confidence > 0.0 && detection.class_id >= 0
}

/// Validity rule plus class selection, applied identically by every consumer.
pub fn passes_filter(detection: &Detection, selection: &ClassSelection) -> bool {
    is_valid_detection(detection) && selection.is_selected(detection.class_id)
}

/// Detections of `result` that any consumer may surface, in model order.
pub fn select_detections(result: &DetectionResult) -> impl Iterator<Item = &Detection> + '_ {
    result
        .detections
        .iter()
        .filter(move |d| passes_filter(d, &result.selected_classes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use std::time::SystemTime;

    fn det(class_id: i32, name: &str, confidence: f32) -> Detection {
        Detection::new(class_id, name, confidence, BoundingBox::new(10, 10, 50, 50))
    }

    #[test]
    fn empty_selection_passes_everything() {
        let selection = ClassSelection::all();
        assert!(selection.is_selected(0));
        assert!(selection.is_selected(79));
        assert!(selection.is_all());
    }

    #[test]
    fn explicit_selection_is_exclusive() {
        let selection = ClassSelection::only([2, 7]);
        assert!(selection.is_selected(2));
        assert!(!selection.is_selected(0));
        assert!(!selection.is_all());
    }

    #[test]
    fn person_forced_only_into_explicit_filters() {
        assert!(ClassSelection::all().with_person().is_all());
        let forced = ClassSelection::only([2]).with_person();
        assert_eq!(forced.ids().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn sentinel_detections_never_pass() {
        let selection = ClassSelection::all();
        assert!(!passes_filter(&det(0, "person", 0.0), &selection));
        assert!(!passes_filter(&det(0, "person", -0.5), &selection));
        assert!(!passes_filter(&det(-1, "person", 0.9), &selection));
        assert!(!passes_filter(&det(0, "person", f32::NAN), &selection));
        assert!(passes_filter(&det(0, "person", 0.01), &selection));
    }

    #[test]
    fn select_detections_keeps_model_order() {
        let result = DetectionResult::new(
            vec![
                det(2, "car", 0.8),
                det(1, "bicycle", 0.7),
                det(0, "person", 0.9),
                det(-1, "", 0.0),
            ],
            SystemTime::now(),
        )
        .with_selection(ClassSelection::only([0, 2]));
        let names: Vec<_> = select_detections(&result)
            .map(|d| d.class_name.as_str())
            .collect();
        assert_eq!(names, vec!["car", "person"]);
    }

    #[test]
    fn mapping_passes_unknown_names_through() {
        let mapping = ClassNameMapping::new().with("person", "faces");
        assert_eq!(mapping.map("person"), "faces");
        assert_eq!(mapping.map("truck"), "truck");
    }
}
