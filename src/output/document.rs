//! Structured-document export of a render tree.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::render::RenderNode;

/// One node of the structured-document export.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Display name: group plus formatted arguments and result, or
    /// `group xN` when merged
    pub name: String,

    /// Duration in milliseconds, decimally rounded
    pub length: String,

    /// Display value: the duration, or the total call count in
    /// calls-as-value mode
    pub value: DocumentValue,

    /// Confidence that the duration is distinguishable from overhead, 0..=1
    pub representative: f64,

    /// Occurrences of each group name in this subtree
    pub calls: BTreeMap<String, u64>,

    /// Child documents, in render order
    pub children: Vec<Document>,
}

/// The `value` field of a document node: a call count or a duration,
/// serialized as a bare number either way.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum DocumentValue {
    Calls(u64),
    Length(f64),
}

/// Recursively exports a render tree as a structured document.
pub fn render_document(node: &RenderNode) -> Document {
    Document {
        name: node.display_name(),
        length: format_length(node.length_ms()),
        value: if node.uses_calls_as_value() {
            DocumentValue::Calls(node.call_total())
        } else {
            DocumentValue::Length(node.length_ms())
        },
        representative: node.representative(),
        calls: node.calls().clone(),
        children: node.children().iter().map(render_document).collect(),
    }
}

/// Rounds so very small durations keep significant digits: precision is
/// `-floor(min(log10(length), -2))`, with zero-length nodes pinned at 2
/// decimals (`log10(0)` has no value).
fn format_length(length: f64) -> String {
    let magnitude = if length != 0.0 { length.log10() } else { 0.0 };
    let places = (-magnitude.min(-2.0).floor()) as usize;
    format!("{length:.places$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_length_zero_keeps_two_decimals() {
        assert_eq!(format_length(0.0), "0.00");
    }

    #[test]
    fn test_format_length_large_values() {
        assert_eq!(format_length(100.0), "100.00");
        assert_eq!(format_length(42.1234), "42.12");
    }

    #[test]
    fn test_format_length_small_values_keep_significant_digits() {
        assert_eq!(format_length(0.001), "0.001");
        assert_eq!(format_length(0.00052), "0.0005");
    }
}
