//! Error types for the session engine and its collaborators.

use parley_core::ParleyError;
use serde_json::{json, Value};

/// Why an attachment could not be loaded. These never reach the transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("read failed: {0}")]
    ReadFailure(String),
    #[error("read aborted")]
    ReadAborted,
}

/// Any failure to obtain a JSON body from the answering service.
///
/// Non-2xx statuses, network errors and unparseable bodies are reported
/// uniformly; `detail` keeps the body's `detail` field or its raw text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", describe(.status, .message))]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
    pub detail: Option<Value>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>, detail: Option<Value>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            detail,
        }
    }

    /// Diagnostic payload stored on the error message.
    pub fn to_detail(&self) -> Value {
        json!({
            "status": self.status,
            "message": self.message,
            "detail": self.detail,
        })
    }
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("service returned HTTP {}: {}", status, message),
        None => format!("transport error: {}", message),
    }
}

/// Operation-level rejections from the session engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("nothing to send: prompt is empty and no attachment is ready")]
    EmptySubmission,
    #[error("a turn is already in flight")]
    TurnInFlight,
    #[error("cannot retry message {index}: {reason}")]
    RetryNotAllowed { index: usize, reason: &'static str },
    #[error("message index out of range: {0}")]
    IndexOutOfRange(usize),
    #[error("attachment error: {0}")]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ChatError> for ParleyError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Attachment(e) => ParleyError::Attachment(e.to_string()),
            ChatError::Transport(e) => ParleyError::Service(e.to_string()),
            other => ParleyError::Chat(other.to_string()),
        }
    }
}

impl From<AttachmentError> for ParleyError {
    fn from(err: AttachmentError) -> Self {
        ParleyError::Attachment(err.to_string())
    }
}

impl From<TransportError> for ParleyError {
    fn from(err: TransportError) -> Self {
        ParleyError::Service(err.to_string())
    }
}
