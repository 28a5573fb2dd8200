//! Minimal chart contract check.
//!
//! A candidate must be an object with `type`, `labels` and `values`, where
//! `type` is one of bar/line/pie and `labels`/`values` are arrays of equal,
//! non-zero length. Anything else is rejected outright.

use parley_core::ChartType;
use serde_json::Value;
use tracing::debug;

use crate::error::GraphValidationError;
use crate::extract::RawGraphCandidate;

/// A candidate that passed validation, with loosely-typed fields resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedGraph {
    pub chart_type: ChartType,
    pub labels: Vec<String>,
    /// `None` marks a null, non-numeric or non-finite value.
    pub values: Vec<Option<f64>>,
    pub title: Option<String>,
    pub dataset_label: Option<String>,
}

/// Whether the candidate satisfies the chart contract.
pub fn validate(candidate: &RawGraphCandidate) -> bool {
    check(candidate).is_ok()
}

/// Validate a candidate, reporting the first failed requirement.
pub fn check(candidate: &RawGraphCandidate) -> Result<ValidatedGraph, GraphValidationError> {
    let result = check_inner(candidate);
    if let Err(ref e) = result {
        debug!(reason = %e, "Graph candidate rejected");
    }
    result
}

fn check_inner(candidate: &RawGraphCandidate) -> Result<ValidatedGraph, GraphValidationError> {
    let obj = candidate
        .payload()
        .as_object()
        .ok_or(GraphValidationError::NotAnObject)?;

    for field in ["type", "labels", "values"] {
        if !obj.contains_key(field) {
            return Err(GraphValidationError::MissingField(field));
        }
    }

    let chart_type = match obj.get("type") {
        Some(Value::String(t)) => ChartType::from_wire(t)
            .ok_or_else(|| GraphValidationError::UnsupportedType(t.clone()))?,
        Some(other) => return Err(GraphValidationError::UnsupportedType(other.to_string())),
        None => return Err(GraphValidationError::MissingField("type")),
    };

    let labels = obj
        .get("labels")
        .and_then(Value::as_array)
        .ok_or(GraphValidationError::NotASequence("labels"))?;
    let values = obj
        .get("values")
        .and_then(Value::as_array)
        .ok_or(GraphValidationError::NotASequence("values"))?;

    if labels.len() != values.len() {
        return Err(GraphValidationError::LengthMismatch {
            labels: labels.len(),
            values: values.len(),
        });
    }
    if labels.is_empty() {
        return Err(GraphValidationError::Empty);
    }

    Ok(ValidatedGraph {
        chart_type,
        labels: labels.iter().map(label_text).collect(),
        values: values.iter().map(numeric_value).collect(),
        title: candidate.title().map(str::to_string),
        dataset_label: candidate.dataset_label().map(str::to_string),
    })
}

/// Display text for a label of any JSON type.
pub(crate) fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric reading of a value; numeric strings are accepted.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}
