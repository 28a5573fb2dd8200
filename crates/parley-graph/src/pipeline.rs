//! Graph resolution for a whole response body: extract, validate, normalize.

use parley_core::{ChartConfig, ThemeVariant};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::{self, Extraction};
use crate::normalize::{normalize_candidate, normalize_complete};

/// What a response contributes to the transcript graphically.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOutcome {
    /// A validated, themed chart.
    Chart(ChartConfig),
    /// A graph payload was found but failed validation.
    Rejected { payload: Value, reason: String },
    /// Nothing graph-shaped; render as text.
    None,
}

/// Extract, validate and normalize the graph carried by a service response.
pub fn resolve(response: &Value, theme: ThemeVariant) -> GraphOutcome {
    match extract::extract(response) {
        Extraction::PlainText => GraphOutcome::None,
        Extraction::Candidate(candidate) => match normalize_candidate(&candidate, theme) {
            Ok(config) => {
                debug!(chart_type = %config.chart_type, points = config.labels.len(), "Graph resolved");
                GraphOutcome::Chart(config)
            }
            Err(e) => {
                warn!(reason = %e, "Discarding invalid graph payload");
                GraphOutcome::Rejected {
                    payload: candidate.into_payload(),
                    reason: e.to_string(),
                }
            }
        },
        Extraction::Complete(config) => match normalize_complete(&config, theme) {
            Ok(chart) => GraphOutcome::Chart(chart),
            Err(e) => {
                warn!(reason = %e, "Discarding invalid chart config");
                GraphOutcome::Rejected {
                    payload: config,
                    reason: e.to_string(),
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ChartType;
    use serde_json::json;

    #[test]
    fn test_resolve_structured_bar() {
        let response = json!({
            "response": "Here is the breakdown",
            "graph_data": {"type": "bar", "labels": ["Q1", "Q2"], "values": [10, 20]},
        });
        match resolve(&response, ThemeVariant::Dark) {
            GraphOutcome::Chart(config) => {
                assert_eq!(config.chart_type, ChartType::Bar);
                assert_eq!(config.labels, vec!["Q1", "Q2"]);
            }
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_fenced_round_trip() {
        let original = json!({"type": "line", "labels": ["a", "b"], "values": [1, 2]});
        let text = format!(
            "Intro {{not json}}\n```json\n{}\n```\nOutro {{also not}}",
            json!({"graph_data": original})
        );
        let GraphOutcome::Chart(config) = resolve(&Value::String(text), ThemeVariant::Light) else {
            panic!("expected chart");
        };
        assert_eq!(config.chart_type, ChartType::Line);
        assert_eq!(config.series[0].values, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_resolve_rejects_mismatched_lengths() {
        let payload = json!({"type": "bar", "labels": ["a", "b", "c"], "values": [1, 2]});
        let response = json!({"graph_data": payload.clone()});
        match resolve(&response, ThemeVariant::Light) {
            GraphOutcome::Rejected { payload: p, reason } => {
                assert_eq!(p, payload);
                assert!(reason.contains("mismatch"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_plain_text() {
        let response = json!({"response": "No chart here."});
        assert_eq!(resolve(&response, ThemeVariant::Light), GraphOutcome::None);
    }
}
