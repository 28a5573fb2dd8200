//! Plain-text transcript rendering for terminal surfaces.

use parley_core::{ChartConfig, ChartType, Message, Sender, TokenUsage};
use parley_graph::render::format_value;
use parley_graph::{plan, DataTable, RenderPlan};

const DEFAULT_BAR_WIDTH: usize = 30;
const BAR_CHAR: char = '#';

/// Renders messages, charts and tables as lines of text.
#[derive(Debug, Clone)]
pub struct TranscriptRenderer {
    bar_width: usize,
}

impl Default for TranscriptRenderer {
    fn default() -> Self {
        Self {
            bar_width: DEFAULT_BAR_WIDTH,
        }
    }
}

impl TranscriptRenderer {
    pub fn with_bar_width(bar_width: usize) -> Self {
        Self {
            bar_width: bar_width.max(1),
        }
    }

    pub fn render(&self, messages: &[Message]) -> Vec<String> {
        messages.iter().flat_map(|m| self.render_message(m)).collect()
    }

    pub fn render_message(&self, message: &Message) -> Vec<String> {
        let mut lines = Vec::new();
        let index = message.sequence_index;

        let speaker = match (message.sender, message.is_error) {
            (Sender::User, _) => format!("[{}] You", index),
            (Sender::Agent, false) => format!("[{}] Agent", index),
            (Sender::Agent, true) => format!("[{}] Agent (error)", index),
        };
        let mut text_lines = message.text.lines();
        match text_lines.next() {
            Some(first) => lines.push(format!("{}: {}", speaker, first)),
            None => lines.push(format!("{}:", speaker)),
        }
        lines.extend(text_lines.map(|l| format!("    {}", l)));

        if let Some(ref name) = message.attachment_name {
            lines.push(format!("    [attached: {}]", name));
        }

        if let Some(config) = message.graph() {
            match plan(config) {
                RenderPlan::Chart(config) => lines.extend(self.render_chart(config)),
                RenderPlan::Table(table) => lines.extend(render_table(&table)),
                RenderPlan::Invalid(reason) => lines.push(format!("    ! {}", reason)),
            }
        }

        if let Some(ref rejected) = message.rejected_graph {
            lines.push(format!("    ! Invalid graph data: {}", rejected.reason));
            let pretty = serde_json::to_string_pretty(&rejected.payload)
                .unwrap_or_else(|_| rejected.payload.to_string());
            lines.extend(pretty.lines().map(|l| format!("      {}", l)));
        }

        if message.is_error {
            lines.push(format!("    (use /retry {} to try again)", index));
        }

        if let Some(tokens) = message.tokens {
            lines.push(format!("    {}", token_footer(tokens)));
        }
        lines
    }

    /// Horizontal text bars, or percentage shares for pie charts.
    pub fn render_chart(&self, config: &ChartConfig) -> Vec<String> {
        let mut lines = vec![format!("    {} ({} chart)", config.title, config.chart_type)];
        let label_width = config.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

        for series in &config.series {
            if config.series.len() > 1 {
                lines.push(format!("    {}", series.name));
            }
            let values: Vec<f64> = series.values.iter().map(|v| v.unwrap_or(0.0)).collect();

            if config.chart_type == ChartType::Pie {
                let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
                for (label, value) in config.labels.iter().zip(&values) {
                    let share = if total > 0.0 { value.max(0.0) / total * 100.0 } else { 0.0 };
                    lines.push(format!(
                        "    {:<width$}  {:>5.1}%  {}",
                        label,
                        share,
                        format_value(*value),
                        width = label_width
                    ));
                }
                continue;
            }

            let max = values.iter().cloned().fold(0.0_f64, f64::max);
            for (label, value) in config.labels.iter().zip(&values) {
                let len = if max > 0.0 && *value > 0.0 {
                    ((value / max) * self.bar_width as f64).round() as usize
                } else {
                    0
                };
                lines.push(format!(
                    "    {:<width$} | {} {}",
                    label,
                    BAR_CHAR.to_string().repeat(len),
                    format_value(*value),
                    width = label_width
                ));
            }
        }
        lines
    }
}

/// Aligned label/value table.
pub fn render_table(table: &DataTable) -> Vec<String> {
    let columns = table.headers.len();
    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect();
        format!("    {}", padded.join(" | ").trim_end())
    };

    let mut lines = vec![format!("    {}", table.title), format_row(table.headers.as_slice())];
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(format!("    {}", rule.join("-+-")));
    lines.extend(table.rows.iter().map(|row| format_row(row.as_slice())));
    lines
}

pub fn token_footer(tokens: TokenUsage) -> String {
    format!("Tokens: {} in / {} out", tokens.input, tokens.output)
}
