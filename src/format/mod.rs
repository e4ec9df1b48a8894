//! Message formatters: `DetectionResult` to wire string.
//!
//! Every formatter pulls detections through [`crate::filter::select_detections`],
//! so the validity rule and class selection are the same ones the frame
//! writer uses. Formatters hold no mutable state; formatting the same result
//! twice yields identical bytes.
//!
//! Two encodings exist:
//! - JSON objects (keys sorted)
//! - flat `key:value` pairs joined by [`FLAT_SEPARATOR`], `timestamp` last

mod count;
mod full;
mod summary;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::detect::DetectionResult;

pub use count::{ClassNaming, CountFormatter};
pub use full::FullJsonFormatter;
pub use summary::{DetectionCountFormatter, FacesFormatter};

/// Separator between flat `key:value` pairs.
pub const FLAT_SEPARATOR: &str = "!!";

pub trait MessageFormatter: Send {
    /// Render `result`. An empty string means "nothing to send".
    fn format_message(&self, result: &DetectionResult) -> String;
}

impl<F: MessageFormatter + ?Sized> MessageFormatter for Box<F> {
    fn format_message(&self, result: &DetectionResult) -> String {
        (**self).format_message(result)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Flat,
}

/// Encode integer fields plus the result timestamp.
///
/// `fields` keep their order in the flat form; JSON keys come out sorted.
pub(crate) fn encode_fields<I>(encoding: Encoding, fields: I, timestamp: u64) -> String
where
    I: IntoIterator<Item = (String, u64)>,
{
    match encoding {
        Encoding::Json => {
            let mut map: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect();
            map.insert("timestamp".to_string(), Value::from(timestamp));
            Value::Object(map).to_string()
        }
        Encoding::Flat => fields
            .into_iter()
            .map(|(key, value)| format!("{}:{}", key, value))
            .chain(std::iter::once(format!("timestamp:{}", timestamp)))
            .collect::<Vec<_>>()
            .join(FLAT_SEPARATOR),
    }
}

/// Sorted per-name counts.
pub type ClassCounts = BTreeMap<String, u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_keeps_field_order_and_ends_with_timestamp() {
        let out = encode_fields(
            Encoding::Flat,
            vec![("b".to_string(), 2), ("a".to_string(), 1)],
            42,
        );
        assert_eq!(out, "b:2!!a:1!!timestamp:42");
    }

    #[test]
    fn json_is_a_flat_object() {
        let out = encode_fields(Encoding::Json, vec![("car".to_string(), 3)], 7);
        assert_eq!(out, r#"{"car":3,"timestamp":7}"#);
    }
}
