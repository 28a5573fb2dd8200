//! Session engine: message log, turn sequencing, retry and request building.
//!
//! All state lives behind one `std::sync::Mutex` that is released before the
//! service call is awaited. At most one turn is in flight, so the log order
//! is the chronological turn order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use parley_core::{
    AskRequest, AskResponse, BehaviorMode, ChartType, HistoryEntry, Message, MessageKind,
    ParleyConfig, RejectedGraph, Sender, ThemeVariant, TokenUsage,
};
use parley_graph::{resolve, retheme, GraphOutcome};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attachment::AttachmentLoader;
use crate::client::AnswerService;
use crate::error::{ChatError, TransportError};
use crate::turn::TurnState;

const SERVICE_ERROR_FALLBACK: &str = "The service reported an error.";
const CANCELLED_TEXT: &str = "Error: request cancelled";

// =============================================================================
// Types
// =============================================================================

/// Settings a session starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub behavior_mode: BehaviorMode,
    pub theme: ThemeVariant,
    pub default_graph_type: ChartType,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            behavior_mode: BehaviorMode::Balanced,
            theme: ThemeVariant::Light,
            default_graph_type: ChartType::Bar,
        }
    }
}

impl From<&ParleyConfig> for SessionOptions {
    fn from(config: &ParleyConfig) -> Self {
        Self {
            behavior_mode: config.chat.behavior_mode,
            theme: config.ui.theme,
            default_graph_type: config.chat.default_graph_type,
        }
    }
}

/// How a dispatched turn ended. Either way exactly one agent message was
/// appended at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Succeeded { index: usize },
    Failed { index: usize },
}

impl TurnOutcome {
    pub fn index(&self) -> usize {
        match self {
            TurnOutcome::Succeeded { index } | TurnOutcome::Failed { index } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Succeeded { .. })
    }
}

/// What was asked for a user message, kept so a retry re-sends the same
/// prompt and graph flags.
#[derive(Debug, Clone)]
struct SentPrompt {
    prompt: String,
    is_graph_request: bool,
    graph_type: Option<ChartType>,
}

#[derive(Debug, Default)]
struct SessionState {
    messages: Vec<Message>,
    thread_id: Option<String>,
    turn: TurnState,
    behavior_mode: BehaviorMode,
    theme: ThemeVariant,
    draft: String,
    /// Counters from the most recent response that reported them.
    tokens: TokenUsage,
    total_tokens: TokenUsage,
    sent: HashMap<usize, SentPrompt>,
}

impl SessionState {
    fn history(&self, end: usize) -> Vec<HistoryEntry> {
        self.messages[..end].iter().map(HistoryEntry::from).collect()
    }

    fn append(&mut self, mut message: Message) -> usize {
        let index = self.messages.len();
        message.sequence_index = index;
        self.messages.push(message);
        index
    }

    fn begin_turn(&mut self) -> Result<(), ChatError> {
        if !self.turn.can_transition_to(&TurnState::Submitting) {
            return Err(ChatError::TurnInFlight);
        }
        self.turn = TurnState::Submitting;
        Ok(())
    }

    fn build_request(&self, sent: &SentPrompt, file_content: Option<String>, history_end: usize) -> AskRequest {
        AskRequest {
            agent_mode: self.behavior_mode,
            prompt: sent.prompt.clone(),
            file_content,
            chat_history: self.history(history_end),
            thread_id: self.thread_id.clone(),
            is_graph_request: sent.is_graph_request,
            graph_type: sent.graph_type,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// One conversation with the answering service.
pub struct ChatSession<S: AnswerService> {
    id: Uuid,
    service: S,
    default_graph_type: ChartType,
    state: Mutex<SessionState>,
}

impl<S: AnswerService> ChatSession<S> {
    pub fn new(service: S, options: SessionOptions) -> Self {
        let id = Uuid::new_v4();
        info!(session_id = %id, mode = %options.behavior_mode, theme = %options.theme, "Chat session created");
        Self {
            id,
            service,
            default_graph_type: options.default_graph_type,
            state: Mutex::new(SessionState {
                behavior_mode: options.behavior_mode,
                theme: options.theme,
                ..SessionState::default()
            }),
        }
    }

    /// Send a prompt, with the attachment's content if it is ready.
    ///
    /// On acceptance the user message is appended, the draft is cleared and
    /// ready attachment content is consumed before the service is called. A
    /// read still in progress is left untouched.
    pub async fn submit(
        &self,
        prompt: &str,
        attachment: Option<&AttachmentLoader>,
    ) -> Result<TurnOutcome, ChatError> {
        let request = {
            let mut state = self.lock();
            if state.turn.is_pending() {
                debug!(session_id = %self.id, "Submission rejected, turn in flight");
                return Err(ChatError::TurnInFlight);
            }
            let consumed = attachment.and_then(AttachmentLoader::take_ready);
            if prompt.trim().is_empty() && consumed.is_none() {
                return Err(ChatError::EmptySubmission);
            }
            state.begin_turn()?;
            if let Some(loader) = attachment {
                loader.clear_failed();
            }

            let sent = SentPrompt {
                prompt: prompt.to_string(),
                is_graph_request: prompt.to_lowercase().contains("graph"),
                graph_type: None,
            };
            let history_end = state.messages.len();
            let (attachment_name, file_content) = match consumed {
                Some(c) => (Some(c.name), Some(c.content)),
                None => (None, None),
            };
            let request = state.build_request(&sent, file_content, history_end);

            let mut user = Message::user(prompt);
            user.attachment_name = attachment_name;
            let index = state.append(user);
            state.sent.insert(index, sent);
            state.draft.clear();
            request
        };

        self.dispatch(request).await
    }

    /// Submit the engine-owned draft text.
    pub async fn submit_draft(
        &self,
        attachment: Option<&AttachmentLoader>,
    ) -> Result<TurnOutcome, ChatError> {
        let draft = self.draft();
        self.submit(&draft, attachment).await
    }

    /// Ask for a chart of the given type, or the configured default.
    pub async fn request_graph(&self, chart_type: Option<ChartType>) -> Result<TurnOutcome, ChatError> {
        let chart_type = chart_type.unwrap_or(self.default_graph_type);
        let request = {
            let mut state = self.lock();
            state.begin_turn()?;
            let sent = SentPrompt {
                prompt: format!("Generate {} graph data", chart_type),
                is_graph_request: true,
                graph_type: Some(chart_type),
            };
            let history_end = state.messages.len();
            let request = state.build_request(&sent, None, history_end);
            let index = state.append(Message::user(format!("Show me a {} graph", chart_type)));
            state.sent.insert(index, sent);
            request
        };

        self.dispatch(request).await
    }

    /// Re-send the user turn that produced the error message at `index`.
    ///
    /// The log is truncated to `[..index]`, so the failed response disappears
    /// and the user message is not duplicated.
    pub async fn retry(&self, index: usize) -> Result<TurnOutcome, ChatError> {
        let request = {
            let mut state = self.lock();
            if state.turn.is_pending() {
                return Err(ChatError::TurnInFlight);
            }
            let target = state
                .messages
                .get(index)
                .ok_or(ChatError::IndexOutOfRange(index))?;
            if !target.is_error {
                return Err(ChatError::RetryNotAllowed {
                    index,
                    reason: "message is not an error",
                });
            }
            let user_index = match index.checked_sub(1) {
                Some(i) if state.messages[i].sender == Sender::User => i,
                _ => {
                    return Err(ChatError::RetryNotAllowed {
                        index,
                        reason: "no user message precedes it",
                    })
                }
            };
            state.begin_turn()?;

            let sent = state.sent.get(&user_index).cloned().unwrap_or_else(|| {
                let text = &state.messages[user_index].text;
                SentPrompt {
                    prompt: text.clone(),
                    is_graph_request: text.to_lowercase().contains("graph"),
                    graph_type: None,
                }
            });
            state.messages.truncate(index);
            state.sent.retain(|&i, _| i < index);
            info!(session_id = %self.id, index, "Retrying turn");
            state.build_request(&sent, None, user_index)
        };

        self.dispatch(request).await
    }

    /// Await the service and merge its answer into the log.
    async fn dispatch(&self, request: AskRequest) -> Result<TurnOutcome, ChatError> {
        debug!(
            session_id = %self.id,
            history = request.chat_history.len(),
            has_file = request.file_content.is_some(),
            graph = request.is_graph_request,
            "Dispatching turn"
        );
        let pending = PendingTurn::new(self.id, &self.state);
        let result = self.service.ask(&request).await;
        pending.disarm();

        let mut state = self.lock();
        let outcome = match result {
            Ok(body) => {
                let message = merge_response(&mut state, &body);
                let failed = message.is_error;
                let index = state.append(message);
                if failed {
                    TurnOutcome::Failed { index }
                } else {
                    TurnOutcome::Succeeded { index }
                }
            }
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "Turn failed");
                let index = state.append(transport_failure_message(&err));
                TurnOutcome::Failed { index }
            }
        };
        state.turn = if outcome.is_success() {
            TurnState::Succeeded
        } else {
            TurnState::Failed
        };
        Ok(outcome)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Switch theme and restyle every stored chart.
    pub fn set_theme(&self, theme: ThemeVariant) {
        let mut state = self.lock();
        if state.theme == theme {
            return;
        }
        state.theme = theme;
        for message in state.messages.iter_mut() {
            if let MessageKind::Graph(ref mut config) = message.kind {
                *config = retheme(config, theme);
            }
        }
        debug!(session_id = %self.id, theme = %theme, "Theme changed");
    }

    pub fn set_behavior_mode(&self, mode: BehaviorMode) {
        self.lock().behavior_mode = mode;
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn message(&self, index: usize) -> Option<Message> {
        self.lock().messages.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn thread_id(&self) -> Option<String> {
        self.lock().thread_id.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().turn.is_pending()
    }

    pub fn turn_state(&self) -> TurnState {
        self.lock().turn
    }

    /// Counters from the most recent response that reported them.
    pub fn tokens(&self) -> TokenUsage {
        self.lock().tokens
    }

    pub fn total_tokens(&self) -> TokenUsage {
        self.lock().total_tokens
    }

    pub fn theme(&self) -> ThemeVariant {
        self.lock().theme
    }

    pub fn behavior_mode(&self) -> BehaviorMode {
        self.lock().behavior_mode
    }

    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    /// Probe the answering service.
    pub async fn health_check(&self) -> Result<Value, ChatError> {
        Ok(self.service.health_check().await?)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // Poisoned state is still structurally valid.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Settles an in-flight turn whose future is dropped before the service
/// answers: the turn fails with a retryable error message.
struct PendingTurn<'a> {
    session_id: Uuid,
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl<'a> PendingTurn<'a> {
    fn new(session_id: Uuid, state: &'a Mutex<SessionState>) -> Self {
        Self {
            session_id,
            state,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock_state(self.state);
        let index = state.append(Message::agent_error(CANCELLED_TEXT, None));
        state.turn = TurnState::Failed;
        warn!(session_id = %self.session_id, index, "Turn cancelled before the service answered");
    }
}

// =============================================================================
// Response merging
// =============================================================================

/// Build the agent message for a JSON body and update thread and token state.
fn merge_response(state: &mut SessionState, body: &Value) -> Message {
    let parsed = AskResponse::from_value(body);

    if let Some(ref thread_id) = parsed.thread_id {
        if state.thread_id.as_ref() != Some(thread_id) {
            info!(thread_id = %thread_id, "Thread established");
        }
        state.thread_id = Some(thread_id.clone());
    }
    if let Some(input) = parsed.input_tokens {
        state.tokens.input = input;
        state.total_tokens.input += input;
    }
    if let Some(output) = parsed.output_tokens {
        state.tokens.output = output;
        state.total_tokens.output += output;
    }
    let tokens = parsed.token_usage();

    let mut message = if parsed.is_error_status() {
        service_error_message(&parsed)
    } else {
        let mut message = Message::agent(parsed.response.clone());
        match resolve(body, state.theme) {
            GraphOutcome::Chart(config) => message.kind = MessageKind::Graph(config),
            GraphOutcome::Rejected { payload, reason } => {
                message.rejected_graph = Some(RejectedGraph { payload, reason });
            }
            GraphOutcome::None => {}
        }
        message
    };
    message.tokens = tokens;
    message
}

fn service_error_message(parsed: &AskResponse) -> Message {
    let mut text = if parsed.response.trim().is_empty() {
        parsed
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| SERVICE_ERROR_FALLBACK.to_string())
    } else {
        parsed.response.clone()
    };
    if !parsed.available_columns.is_empty() {
        text.push_str("\n\nAvailable columns: ");
        text.push_str(&parsed.available_columns.join(", "));
    }
    warn!(message = ?parsed.message, "Answering service reported an error");
    Message::agent_error(text, parsed.details.clone())
}

fn transport_failure_message(err: &TransportError) -> Message {
    let reason = match err.detail {
        Some(Value::String(ref detail)) if !detail.trim().is_empty() => detail.clone(),
        _ => err.message.clone(),
    };
    Message::agent_error(format!("Error: {}", reason), Some(err.to_detail()))
}
