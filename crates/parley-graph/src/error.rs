//! Reasons a graph payload is rejected.

/// Why a candidate failed the chart contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphValidationError {
    #[error("graph payload is not an object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unsupported chart type: {0}")]
    UnsupportedType(String),
    #[error("field is not a sequence: {0}")]
    NotASequence(&'static str),
    #[error("labels and values length mismatch: {labels} labels, {values} values")]
    LengthMismatch { labels: usize, values: usize },
    #[error("graph payload has no data points")]
    Empty,
}
