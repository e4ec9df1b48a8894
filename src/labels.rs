//! Class label list and class-filter resolution.
//!
//! The label file has one class name per line; the line index (ignoring blank
//! lines) is the class ID the model reports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::filter::ClassSelection;

pub const LABELS_FILE_NAME: &str = "coco_80_labels_list.txt";

#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    names: Vec<String>,
    ids: HashMap<String, i32>,
}

impl LabelMap {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read labels file {}: {}", path.display(), e))?;
        let labels = Self::parse(&raw);
        if labels.is_empty() {
            return Err(anyhow!("labels file {} has no class names", path.display()));
        }
        log::info!("loaded {} class labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    pub fn parse(raw: &str) -> Self {
        let mut labels = Self::default();
        for line in raw.lines() {
            let name = line.trim_end();
            if name.is_empty() {
                continue;
            }
            let id = labels.names.len() as i32;
            labels.names.push(name.to_string());
            labels.ids.insert(name.to_string(), id);
        }
        labels
    }

    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.ids.get(name).copied()
    }

    pub fn name_of(&self, class_id: i32) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Places searched for the label file, in order.
pub fn candidate_label_paths(model_path: &Path) -> Vec<PathBuf> {
    let model_dir = model_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    vec![
        model_dir.join(LABELS_FILE_NAME),
        Path::new("model").join(LABELS_FILE_NAME),
        Path::new("../model").join(LABELS_FILE_NAME),
    ]
}

/// First existing label file next to the model or in the conventional
/// `model/` directories.
pub fn resolve_labels_path(model_path: &Path) -> Option<PathBuf> {
    candidate_label_paths(model_path)
        .into_iter()
        .find(|path| path.is_file())
}

/// Resolve a comma-separated class list to IDs. Unknown names are dropped
/// with a warning; duplicates are collapsed.
pub fn parse_class_names(classes: &str, labels: &LabelMap) -> Vec<i32> {
    let mut ids = Vec::new();
    for name in classes.split(',') {
        let name = name.trim_matches(|c| c == ' ' || c == '\t');
        if name.is_empty() {
            continue;
        }
        match labels.id_of(name) {
            Some(id) => {
                log::info!("selected class: {} (id {})", name, id);
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            None => log::warn!("unknown class name '{}', ignoring", name),
        }
    }
    ids
}

/// Build the run's class selection from the `--classes` value.
///
/// - No list (or a blank one): every class passes.
/// - A list with at least one known name: those classes plus person.
/// - A list with no known names: warns and falls back to every class.
///
/// A list without labels to resolve it against is a startup error.
pub fn resolve_class_selection(
    classes: Option<&str>,
    labels: Option<&LabelMap>,
) -> Result<ClassSelection> {
    let Some(classes) = classes.filter(|c| !c.trim().is_empty()) else {
        return Ok(ClassSelection::all());
    };
    let labels = labels.ok_or_else(|| {
        anyhow!("class filter '{}' requested but no labels file is available", classes)
    })?;
    let ids = parse_class_names(classes, labels);
    if ids.is_empty() {
        log::warn!("no valid classes found in '{}', using all classes", classes);
        return Ok(ClassSelection::all());
    }
    Ok(ClassSelection::only(ids).with_person())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: &str = "person\nbicycle\ncar  \n\nmotorcycle\n";

    #[test]
    fn blank_lines_do_not_consume_ids() {
        let labels = LabelMap::parse(LABELS);
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.id_of("car"), Some(2));
        assert_eq!(labels.id_of("motorcycle"), Some(3));
        assert_eq!(labels.name_of(1), Some("bicycle"));
        assert_eq!(labels.name_of(-1), None);
    }

    #[test]
    fn parses_trimmed_names_and_drops_unknown() {
        let labels = LabelMap::parse(LABELS);
        let ids = parse_class_names(" car,\tbicycle , unicorn,,car", &labels);
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn explicit_filter_forces_person() {
        let labels = LabelMap::parse(LABELS);
        let selection = resolve_class_selection(Some("car"), Some(&labels)).unwrap();
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn no_filter_means_all_classes() {
        assert!(resolve_class_selection(None, None).unwrap().is_all());
        assert!(resolve_class_selection(Some("  "), None).unwrap().is_all());
    }

    #[test]
    fn unresolvable_filter_falls_back_to_all() {
        let labels = LabelMap::parse(LABELS);
        let selection = resolve_class_selection(Some("unicorn"), Some(&labels)).unwrap();
        assert!(selection.is_all());
    }

    #[test]
    fn filter_without_labels_is_fatal() {
        assert!(resolve_class_selection(Some("car"), None).is_err());
    }

    #[test]
    fn label_candidates_start_next_to_model() {
        let paths = candidate_label_paths(Path::new("/opt/models/yolo.onnx"));
        assert_eq!(paths[0], Path::new("/opt/models").join(LABELS_FILE_NAME));
        let bare = candidate_label_paths(Path::new("yolo.onnx"));
        assert_eq!(bare[0], Path::new(".").join(LABELS_FILE_NAME));
    }
}
