use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// =============================================================================
// Enums
// =============================================================================

/// Who authored a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
}

impl Sender {
    /// Role string used in the `chat_history` wire format.
    pub fn wire_role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Agent => "agent",
        }
    }
}

/// Supported chart shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
}

impl ChartType {
    /// Parse the exact lowercase wire spelling used by the answering service.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "bar" => Some(ChartType::Bar),
            "line" => Some(ChartType::Line),
            "pie" => Some(ChartType::Pie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
        }
    }

    /// Whether the palette assigns one color per category (bar, pie) rather
    /// than one color for the whole series (line).
    pub fn colors_per_category(&self) -> bool {
        !matches!(self, ChartType::Line)
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartType::from_wire(&s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown chart type '{}' (expected bar, line or pie)", s))
    }
}

/// Light or dark presentation theme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeVariant {
    #[default]
    Light,
    Dark,
}

impl ThemeVariant {
    pub fn toggled(&self) -> Self {
        match self {
            ThemeVariant::Light => ThemeVariant::Dark,
            ThemeVariant::Dark => ThemeVariant::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeVariant::Light => "light",
            ThemeVariant::Dark => "dark",
        }
    }
}

impl fmt::Display for ThemeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeVariant::Light),
            "dark" => Ok(ThemeVariant::Dark),
            other => Err(format!("unknown theme '{}' (expected light or dark)", other)),
        }
    }
}

/// Response-style preference sent with each request as `agentMode`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorMode {
    #[default]
    Balanced,
    Short,
    Detailed,
    Structured,
}

impl BehaviorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorMode::Balanced => "Balanced",
            BehaviorMode::Short => "Short",
            BehaviorMode::Detailed => "Detailed",
            BehaviorMode::Structured => "Structured",
        }
    }
}

impl fmt::Display for BehaviorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balanced" => Ok(BehaviorMode::Balanced),
            "short" => Ok(BehaviorMode::Short),
            "detailed" => Ok(BehaviorMode::Detailed),
            "structured" => Ok(BehaviorMode::Structured),
            other => Err(format!(
                "unknown behavior mode '{}' (expected balanced, short, detailed or structured)",
                other
            )),
        }
    }
}

// =============================================================================
// Chart configuration
// =============================================================================

/// A color assignment: either one color for everything or one per category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Paint {
    Single(String),
    PerCategory(Vec<String>),
}

impl Paint {
    fn to_value(&self) -> Value {
        match self {
            Paint::Single(color) => Value::String(color.clone()),
            Paint::PerCategory(colors) => json!(colors),
        }
    }
}

/// Fill and stroke colors of one series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesStyle {
    pub fill: Paint,
    pub stroke: Paint,
}

/// One data series. `None` marks a missing or non-numeric value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub style: SeriesStyle,
}

/// Axis tick and grid colors. Absent for pie charts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisStyle {
    pub text_color: String,
    pub grid_color: String,
}

/// Canonical, renderer-ready chart description.
///
/// Every series has exactly `labels.len()` values and there is at least one
/// label. Configs are only built by the normalizer after validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub chart_type: ChartType,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
    pub title: String,
    pub theme: ThemeVariant,
    /// Title and legend text color.
    pub text_color: String,
    pub axes: Option<AxisStyle>,
}

impl ChartConfig {
    /// Whether the label/series shape invariant holds.
    pub fn is_consistent(&self) -> bool {
        !self.labels.is_empty()
            && !self.series.is_empty()
            && self
                .series
                .iter()
                .all(|s| s.values.len() == self.labels.len())
    }

    /// Whether any series carries a missing or non-finite value.
    pub fn has_missing_values(&self) -> bool {
        self.series
            .iter()
            .flat_map(|s| s.values.iter())
            .any(|v| !matches!(v, Some(x) if x.is_finite()))
    }

    /// Emit the complete `{type, data, options}` form.
    ///
    /// The normalizer accepts this shape back as an already-complete chart.
    pub fn to_chart_js(&self) -> Value {
        let datasets: Vec<Value> = self
            .series
            .iter()
            .map(|s| {
                json!({
                    "label": s.name,
                    "data": s.values,
                    "backgroundColor": s.style.fill.to_value(),
                    "borderColor": s.style.stroke.to_value(),
                    "borderWidth": 1,
                })
            })
            .collect();

        let mut options = json!({
            "responsive": true,
            "plugins": {
                "title": { "display": true, "text": self.title, "color": self.text_color },
                "legend": { "labels": { "color": self.text_color } },
            },
        });
        if let Some(ref axes) = self.axes {
            let axis = json!({
                "ticks": { "color": axes.text_color },
                "grid": { "color": axes.grid_color },
            });
            options["scales"] = json!({ "x": axis, "y": axis });
        }

        json!({
            "type": self.chart_type.as_str(),
            "data": { "labels": self.labels, "datasets": datasets },
            "options": options,
        })
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Input/output token counts reported for one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

/// Whether a message is plain text or carries a validated chart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "graph", rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Plain,
    Graph(ChartConfig),
}

/// A would-be chart payload that failed validation, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedGraph {
    pub payload: Value,
    pub reason: String,
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub tokens: Option<TokenUsage>,
    #[serde(default)]
    pub is_error: bool,
    pub error_detail: Option<Value>,
    pub sequence_index: usize,
    /// Name of the file that accompanied a user turn.
    pub attachment_name: Option<String>,
    pub rejected_graph: Option<RejectedGraph>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A plain user message. The sequence index is assigned on append.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text.into())
    }

    /// A plain agent message. The sequence index is assigned on append.
    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Sender::Agent, text.into())
    }

    /// An agent error message carrying an optional diagnostic payload.
    pub fn agent_error(text: impl Into<String>, detail: Option<Value>) -> Self {
        let mut msg = Self::new(Sender::Agent, text.into());
        msg.is_error = true;
        msg.error_detail = detail;
        msg
    }

    fn new(sender: Sender, text: String) -> Self {
        Self {
            sender,
            text,
            kind: MessageKind::Plain,
            tokens: None,
            is_error: false,
            error_detail: None,
            sequence_index: 0,
            attachment_name: None,
            rejected_graph: None,
            created_at: Utc::now(),
        }
    }

    pub fn graph(&self) -> Option<&ChartConfig> {
        match self.kind {
            MessageKind::Graph(ref config) => Some(config),
            MessageKind::Plain => None,
        }
    }

    pub fn is_graph(&self) -> bool {
        self.graph().is_some()
    }
}

// =============================================================================
// Attachments
// =============================================================================

/// Lifecycle phase of an uploaded attachment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentPhase {
    #[default]
    Idle,
    Reading,
    Ready,
    Error,
}

impl fmt::Display for AttachmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentPhase::Idle => write!(f, "idle"),
            AttachmentPhase::Reading => write!(f, "reading"),
            AttachmentPhase::Ready => write!(f, "ready"),
            AttachmentPhase::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of the attachment slot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAttachment {
    pub name: String,
    pub content: Option<String>,
    pub phase: AttachmentPhase,
    pub error_reason: Option<String>,
}

impl UploadedAttachment {
    /// Content that may be submitted: only present once the read is `Ready`.
    pub fn ready_content(&self) -> Option<&str> {
        match self.phase {
            AttachmentPhase::Ready => self.content.as_deref(),
            _ => None,
        }
    }
}

// =============================================================================
// Wire format
// =============================================================================

/// One `chat_history` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.sender.wire_role().to_string(),
            content: msg.text.clone(),
        }
    }
}

/// Request body posted to the answering service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(rename = "agentMode")]
    pub agent_mode: BehaviorMode,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
    pub chat_history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub is_graph_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_type: Option<ChartType>,
}

/// Loosely-read view of a service response.
///
/// Every field is optional on the wire; values of the wrong type are treated
/// as absent rather than failing the whole response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AskResponse {
    pub response: String,
    pub thread_id: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub status: Option<String>,
    pub message: Option<String>,
    pub details: Option<Value>,
    pub available_columns: Vec<String>,
}

impl AskResponse {
    /// Read a response body without trusting its field types.
    pub fn from_value(body: &Value) -> Self {
        let response = match body.get("response") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let details = body.get("details").filter(|d| !d.is_null()).cloned();
        let available_columns = details
            .as_ref()
            .and_then(|d| d.get("available_columns"))
            .or_else(|| body.get("available_columns"))
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .map(|c| match c {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            response,
            thread_id: body
                .get("thread_id")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            input_tokens: body.get("input_tokens").and_then(token_count),
            output_tokens: body.get("output_tokens").and_then(token_count),
            status: body.get("status").and_then(Value::as_str).map(str::to_string),
            message: body.get("message").and_then(Value::as_str).map(str::to_string),
            details,
            available_columns,
        }
    }

    /// Whether the service reported a logical failure.
    pub fn is_error_status(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("error"))
    }

    /// Token usage, when either count is reported. A missing count reads as 0.
    pub fn token_usage(&self) -> Option<TokenUsage> {
        match (self.input_tokens, self.output_tokens) {
            (None, None) => None,
            (input, output) => Some(TokenUsage {
                input: input.unwrap_or(0),
                output: output.unwrap_or(0),
            }),
        }
    }
}

fn token_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}
