//! Canonical chart configuration building.
//!
//! Two input shapes are accepted: the minimal `{type, labels, values}`
//! candidate and an already-complete `{type, data, options}` config. Both
//! come out as a [`ChartConfig`] styled for the current theme. Feeding a
//! config's [`ChartConfig::to_chart_js`] form back in reproduces it.

use parley_core::{ChartConfig, ChartType, Paint, Series, SeriesStyle, ThemeVariant};
use serde_json::Value;
use tracing::debug;

use crate::error::GraphValidationError;
use crate::extract::{Extraction, RawGraphCandidate};
use crate::palette;
use crate::validate::{self, label_text, numeric_value, ValidatedGraph};

const DEFAULT_TITLE: &str = "Chart";
const DEFAULT_SERIES_NAME: &str = "Dataset";

/// Normalize whatever the extractor found. `None` for plain text and for
/// payloads that fail validation.
pub fn normalize(extraction: &Extraction, theme: ThemeVariant) -> Option<ChartConfig> {
    match extraction {
        Extraction::PlainText => None,
        Extraction::Candidate(candidate) => normalize_candidate(candidate, theme).ok(),
        Extraction::Complete(config) => normalize_complete(config, theme).ok(),
    }
}

/// Validate and style a minimal candidate.
pub fn normalize_candidate(
    candidate: &RawGraphCandidate,
    theme: ThemeVariant,
) -> Result<ChartConfig, GraphValidationError> {
    let graph = validate::check(candidate)?;
    Ok(from_validated(graph, theme))
}

/// Build a config from an already-validated candidate.
pub fn from_validated(graph: ValidatedGraph, theme: ThemeVariant) -> ChartConfig {
    let name = graph
        .dataset_label
        .clone()
        .or_else(|| graph.title.clone())
        .unwrap_or_else(|| DEFAULT_SERIES_NAME.to_string());
    let style = palette::series_style(theme, graph.chart_type, graph.labels.len(), 0);

    ChartConfig {
        chart_type: graph.chart_type,
        series: vec![Series {
            name,
            values: graph.values,
            style,
        }],
        labels: graph.labels,
        title: graph.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        theme,
        text_color: palette::text_color(theme).to_string(),
        axes: palette::axis_style(theme, graph.chart_type),
    }
}

/// Accept a complete `{type, data, options}` config after checking its shape.
///
/// Series colors are kept when present. Theme text, legend and axis colors
/// are always replaced.
pub fn normalize_complete(
    config: &Value,
    theme: ThemeVariant,
) -> Result<ChartConfig, GraphValidationError> {
    let obj = config.as_object().ok_or(GraphValidationError::NotAnObject)?;

    let chart_type = match obj.get("type") {
        Some(Value::String(t)) => ChartType::from_wire(t)
            .ok_or_else(|| GraphValidationError::UnsupportedType(t.clone()))?,
        Some(other) => return Err(GraphValidationError::UnsupportedType(other.to_string())),
        None => return Err(GraphValidationError::MissingField("type")),
    };

    let data = obj
        .get("data")
        .filter(|d| d.is_object())
        .ok_or(GraphValidationError::MissingField("data"))?;
    let labels = data
        .get("labels")
        .ok_or(GraphValidationError::MissingField("labels"))?
        .as_array()
        .ok_or(GraphValidationError::NotASequence("labels"))?;
    let datasets = data
        .get("datasets")
        .ok_or(GraphValidationError::MissingField("datasets"))?
        .as_array()
        .ok_or(GraphValidationError::NotASequence("datasets"))?;
    if labels.is_empty() || datasets.is_empty() {
        return Err(GraphValidationError::Empty);
    }

    let mut series = Vec::with_capacity(datasets.len());
    for (i, dataset) in datasets.iter().enumerate() {
        let values = dataset
            .get("data")
            .ok_or(GraphValidationError::MissingField("data"))?
            .as_array()
            .ok_or(GraphValidationError::NotASequence("data"))?;
        if values.len() != labels.len() {
            return Err(GraphValidationError::LengthMismatch {
                labels: labels.len(),
                values: values.len(),
            });
        }

        let fallback = palette::series_style(theme, chart_type, labels.len(), i);
        let style = SeriesStyle {
            fill: dataset
                .get("backgroundColor")
                .and_then(paint)
                .unwrap_or(fallback.fill),
            stroke: dataset
                .get("borderColor")
                .and_then(paint)
                .unwrap_or(fallback.stroke),
        };
        let name = dataset
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_SERIES_NAME.to_string());

        series.push(Series {
            name,
            values: values.iter().map(numeric_value).collect(),
            style,
        });
    }

    let title = config
        .pointer("/options/plugins/title/text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    debug!(chart_type = %chart_type, series = series.len(), "Accepted complete chart config");

    Ok(ChartConfig {
        chart_type,
        labels: labels.iter().map(label_text).collect(),
        series,
        title,
        theme,
        text_color: palette::text_color(theme).to_string(),
        axes: palette::axis_style(theme, chart_type),
    })
}

fn paint(value: &Value) -> Option<Paint> {
    match value {
        Value::String(color) => Some(Paint::Single(color.clone())),
        Value::Array(colors) => colors
            .iter()
            .map(|c| c.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .filter(|c| !c.is_empty())
            .map(Paint::PerCategory),
        _ => None,
    }
}

/// Restyle a stored chart for another theme.
///
/// Series that still carry the old theme's palette colors move to the new
/// palette; custom colors supplied by the service are left alone.
pub fn retheme(config: &ChartConfig, theme: ThemeVariant) -> ChartConfig {
    let mut out = config.clone();
    let label_count = config.labels.len();
    for (i, series) in out.series.iter_mut().enumerate() {
        let old = palette::series_style(config.theme, config.chart_type, label_count, i);
        if series.style == old {
            series.style = palette::series_style(theme, config.chart_type, label_count, i);
        }
    }
    out.theme = theme;
    out.text_color = palette::text_color(theme).to_string();
    out.axes = palette::axis_style(theme, config.chart_type);
    out
}
