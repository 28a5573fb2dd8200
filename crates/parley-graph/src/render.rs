//! Pre-render decision for stored chart configs.
//!
//! Configs are re-checked before they reach a renderer. A broken shape
//! becomes an inline error; missing numbers fall back to a data table.

use parley_core::ChartConfig;
use tracing::warn;

const TABLE_FALLBACK_TITLE: &str = "Data Table";
const MISSING_CELL: &str = "N/A";

/// How a stored chart should be presented.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan<'a> {
    Chart(&'a ChartConfig),
    Table(DataTable),
    Invalid(String),
}

/// Tabular fallback for a chart whose series has unusable values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn from_config(config: &ChartConfig) -> Self {
        let title = if config.title.trim().is_empty() {
            TABLE_FALLBACK_TITLE.to_string()
        } else {
            config.title.clone()
        };

        let mut headers = Vec::with_capacity(config.series.len() + 1);
        headers.push("Label".to_string());
        headers.extend(config.series.iter().map(|s| s.name.clone()));

        let rows = config
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let mut row = Vec::with_capacity(headers.len());
                row.push(label.clone());
                row.extend(config.series.iter().map(|s| {
                    s.values
                        .get(i)
                        .copied()
                        .flatten()
                        .filter(|v| v.is_finite())
                        .map(format_value)
                        .unwrap_or_else(|| MISSING_CELL.to_string())
                }));
                row
            })
            .collect();

        Self { title, headers, rows }
    }
}

/// Decide how to present a stored chart.
pub fn plan(config: &ChartConfig) -> RenderPlan<'_> {
    if !config.is_consistent() {
        warn!(
            labels = config.labels.len(),
            series = config.series.len(),
            "Stored chart config failed shape check"
        );
        return RenderPlan::Invalid(format!(
            "Invalid chart data: {} labels do not match the series",
            config.labels.len()
        ));
    }
    if config.has_missing_values() {
        return RenderPlan::Table(DataTable::from_config(config));
    }
    RenderPlan::Chart(config)
}

/// Integers print without a fractional part.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
