//! Graph payload extraction.
//!
//! The answering service sometimes returns a typed `graph_data` field,
//! sometimes embeds JSON inside prose, and sometimes wraps it in a markdown
//! fence. Extraction tries each location in a fixed order and never fails:
//! every parse error falls through to the next step.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Key spellings under which a graph payload may appear.
pub const GRAPH_FIELDS: [&str; 2] = ["graph_data", "graphData"];

/// Fenced code blocks, optionally tagged with a language.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("Invalid fence regex")
});

// =============================================================================
// Types
// =============================================================================

/// Untrusted graph-shaped payload. Nothing about it is trusted until it
/// passes [`crate::validate::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawGraphCandidate {
    payload: Value,
}

impl RawGraphCandidate {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Field lookup; `None` when the payload is not an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.as_object().and_then(|obj| obj.get(key))
    }

    pub fn title(&self) -> Option<&str> {
        self.non_empty_str(&["title"])
    }

    pub fn dataset_label(&self) -> Option<&str> {
        self.non_empty_str(&["dataset_label", "datasetLabel"])
    }

    fn non_empty_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Result of searching a response for a graph payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Minimal `{type, labels, values}`-style payload.
    Candidate(RawGraphCandidate),
    /// Already-complete chart configuration with `data` and `options`.
    Complete(Value),
    /// No graph payload anywhere; render as text.
    PlainText,
}

impl Extraction {
    pub fn is_plain_text(&self) -> bool {
        matches!(self, Extraction::PlainText)
    }
}

/// Where in the response a payload was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    StructuredField,
    WholeString,
    EmbeddedJson,
    FencedBlock,
}

// =============================================================================
// Extraction
// =============================================================================

/// Locate a graph payload in a response value (object or string).
pub fn extract(response: &Value) -> Extraction {
    match locate(response) {
        Some((source, payload)) => {
            debug!(source = ?source, "Graph payload located");
            classify(payload)
        }
        None => Extraction::PlainText,
    }
}

/// Find the raw payload and the step that matched.
///
/// Objects are checked for a graph field first; when they carry none, the
/// string steps run on their `response` text.
pub fn locate(response: &Value) -> Option<(ExtractionSource, Value)> {
    match response {
        Value::Object(_) => {
            if let Some(payload) = graph_field(response) {
                return Some((ExtractionSource::StructuredField, payload));
            }
            response
                .get("response")
                .and_then(Value::as_str)
                .and_then(locate_in_text)
        }
        Value::String(text) => locate_in_text(text),
        _ => None,
    }
}

/// Run the string steps: whole string, embedded braces, fenced blocks.
pub fn locate_in_text(text: &str) -> Option<(ExtractionSource, Value)> {
    if let Some(payload) = parse_graph_field(text.trim()) {
        return Some((ExtractionSource::WholeString, payload));
    }
    debug!("Whole-string JSON step missed");

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(payload) = parse_graph_field(&text[start..=end]) {
                return Some((ExtractionSource::EmbeddedJson, payload));
            }
        }
    }
    debug!("Embedded JSON step missed");

    for caps in FENCED_BLOCK.captures_iter(text) {
        if let Some(payload) = caps.get(1).and_then(|m| parse_graph_field(m.as_str().trim())) {
            return Some((ExtractionSource::FencedBlock, payload));
        }
    }
    debug!("Fenced block step missed");

    None
}

fn parse_graph_field(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    let parsed: Value = serde_json::from_str(text).ok()?;
    graph_field(&parsed)
}

/// The non-null graph field of an object, with JSON-in-a-string unwrapped.
fn graph_field(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    for key in GRAPH_FIELDS {
        match obj.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(inner)) => {
                match serde_json::from_str::<Value>(inner) {
                    Ok(parsed) if !parsed.is_null() => return Some(parsed),
                    _ => continue,
                }
            }
            Some(other) => return Some(other.clone()),
        }
    }
    None
}

fn classify(payload: Value) -> Extraction {
    let complete = payload
        .as_object()
        .is_some_and(|obj| obj.contains_key("data") && obj.contains_key("options"));
    if complete {
        Extraction::Complete(payload)
    } else {
        Extraction::Candidate(RawGraphCandidate::new(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bar_payload() -> Value {
        json!({"type": "bar", "labels": ["Q1", "Q2"], "values": [10, 20]})
    }

    #[test]
    fn test_structured_field() {
        let response = json!({"response": "here you go", "graph_data": bar_payload()});
        let (source, payload) = locate(&response).unwrap();
        assert_eq!(source, ExtractionSource::StructuredField);
        assert_eq!(payload, bar_payload());
        assert_eq!(
            extract(&response),
            Extraction::Candidate(RawGraphCandidate::new(bar_payload()))
        );
    }

    #[test]
    fn test_structured_camel_case_field() {
        let response = json!({"graphData": bar_payload()});
        let (source, _) = locate(&response).unwrap();
        assert_eq!(source, ExtractionSource::StructuredField);
    }

    #[test]
    fn test_null_graph_field_falls_through_to_text() {
        let text = json!({"graph_data": bar_payload()}).to_string();
        let response = json!({"response": text, "graph_data": null});
        let (source, payload) = locate(&response).unwrap();
        assert_eq!(source, ExtractionSource::WholeString);
        assert_eq!(payload, bar_payload());
    }

    #[test]
    fn test_graph_field_holding_json_string() {
        let response = json!({"graph_data": bar_payload().to_string()});
        let (_, payload) = locate(&response).unwrap();
        assert_eq!(payload, bar_payload());
    }

    #[test]
    fn test_graph_field_holding_prose_is_ignored() {
        let response = json!({"graph_data": "not available"});
        assert!(locate(&response).is_none());
        assert!(extract(&response).is_plain_text());
    }

    #[test]
    fn test_whole_string_both_spellings() {
        for key in GRAPH_FIELDS {
            let mut obj = serde_json::Map::new();
            obj.insert(key.to_string(), bar_payload());
            let text = Value::Object(obj).to_string();
            let (source, payload) = locate(&Value::String(text)).unwrap();
            assert_eq!(source, ExtractionSource::WholeString);
            assert_eq!(payload, bar_payload());
        }
    }

    #[test]
    fn test_embedded_json_in_prose() {
        let text = format!(
            "Sure! Here is the chart: {} Let me know if you need more.",
            json!({"graph_data": bar_payload()})
        );
        let (source, payload) = locate_in_text(&text).unwrap();
        assert_eq!(source, ExtractionSource::EmbeddedJson);
        assert_eq!(payload, bar_payload());
    }

    #[test]
    fn test_fenced_block_when_braces_span_multiple_objects() {
        let text = format!(
            "Notes {{draft}} first.\n```json\n{}\n```\nand {{more}}",
            json!({"graph_data": bar_payload()})
        );
        let (source, payload) = locate_in_text(&text).unwrap();
        assert_eq!(source, ExtractionSource::FencedBlock);
        assert_eq!(payload, bar_payload());
    }

    #[test]
    fn test_first_matching_fence_wins() {
        let second = json!({"type": "pie", "labels": ["a"], "values": [1]});
        let text = format!(
            "{{x}}\n```\nnot json\n```\n```json\n{}\n```\n```json\n{}\n```",
            json!({"graph_data": bar_payload()}),
            json!({"graph_data": second})
        );
        let (source, payload) = locate_in_text(&text).unwrap();
        assert_eq!(source, ExtractionSource::FencedBlock);
        assert_eq!(payload, bar_payload());
    }

    #[test]
    fn test_malformed_inputs_never_panic() {
        let inputs = [
            "",
            "{",
            "}",
            "} backwards {",
            "```",
            "```json\n{\"graph_data\": ",
            "{\"graph_data\": {\"type\": \"bar\"",
            "plain prose with no braces at all",
            "\u{1f4ca} {\u{00e9}}",
        ];
        for input in inputs {
            assert!(locate_in_text(input).is_none(), "input: {:?}", input);
            assert!(extract(&Value::String(input.to_string())).is_plain_text());
        }
    }

    #[test]
    fn test_json_without_graph_field_is_plain_text() {
        let text = json!({"answer": 42}).to_string();
        assert!(extract(&Value::String(text)).is_plain_text());
    }

    #[test]
    fn test_non_object_non_string_is_plain_text() {
        assert!(extract(&json!(null)).is_plain_text());
        assert!(extract(&json!([1, 2, 3])).is_plain_text());
        assert!(extract(&json!(7)).is_plain_text());
    }

    #[test]
    fn test_complete_config_is_classified() {
        let complete = json!({
            "type": "line",
            "data": {"labels": ["a"], "datasets": [{"data": [1]}]},
            "options": {}
        });
        let response = json!({"graph_data": complete.clone()});
        assert_eq!(extract(&response), Extraction::Complete(complete));
    }

    #[test]
    fn test_candidate_accessors() {
        let candidate = RawGraphCandidate::new(json!({
            "type": "bar",
            "title": "  ",
            "datasetLabel": "Revenue",
        }));
        assert_eq!(candidate.title(), None);
        assert_eq!(candidate.dataset_label(), Some("Revenue"));
        assert_eq!(candidate.get("type"), Some(&json!("bar")));

        let not_object = RawGraphCandidate::new(json!([1, 2]));
        assert!(not_object.get("type").is_none());
    }
}
