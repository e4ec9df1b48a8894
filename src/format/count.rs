use super::{encode_fields, ClassCounts, Encoding, MessageFormatter};
use crate::detect::DetectionResult;
use crate::filter::{select_detections, ClassNameMapping, PERSON_CLASS_NAME};

/// Where a count formatter takes its output key names from.
#[derive(Clone, Debug, Default)]
pub enum ClassNaming {
    /// Class names as reported by the model.
    #[default]
    Canonical,
    /// The mapping carried by each result.
    FromResult,
    /// A mapping fixed when the formatter is built.
    Fixed(ClassNameMapping),
}

/// Per-class counts of the selected detections plus a timestamp.
///
/// The person key is always present (0 when absent) so consumers see a
/// stable schema. When names are remapped the person key is remapped too.
#[derive(Clone, Debug)]
pub struct CountFormatter {
    encoding: Encoding,
    naming: ClassNaming,
}

impl CountFormatter {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            naming: ClassNaming::Canonical,
        }
    }

    pub fn json() -> Self {
        Self::new(Encoding::Json)
    }

    pub fn flat() -> Self {
        Self::new(Encoding::Flat)
    }

    pub fn with_naming(mut self, naming: ClassNaming) -> Self {
        self.naming = naming;
        self
    }

    fn output_name<'a>(&'a self, result: &'a DetectionResult, name: &'a str) -> &'a str {
        match &self.naming {
            ClassNaming::Canonical => name,
            ClassNaming::FromResult => result.class_name_mapping.map(name),
            ClassNaming::Fixed(mapping) => mapping.map(name),
        }
    }

    /// Counts keyed by output name, person seeded at zero.
    pub fn count(&self, result: &DetectionResult) -> ClassCounts {
        let mut counts = ClassCounts::new();
        counts.insert(self.output_name(result, PERSON_CLASS_NAME).to_string(), 0);
        for detection in select_detections(result) {
            let key = self.output_name(result, &detection.class_name);
            *counts.entry(key.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

impl MessageFormatter for CountFormatter {
    fn format_message(&self, result: &DetectionResult) -> String {
        encode_fields(self.encoding, self.count(result), result.timestamp_secs())
    }
}
