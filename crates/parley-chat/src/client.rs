//! Answering-service boundary.
//!
//! [`AnswerService`] is the single seam between the session engine and the
//! remote service. [`HttpAnswerService`] talks to the real backend;
//! [`MockAnswerService`] replays scripted replies for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use parley_core::config::ServiceConfig;
use parley_core::AskRequest;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::TransportError;

/// Remote service that answers one prompt per call.
pub trait AnswerService: Send + Sync {
    /// Post a request and return the raw JSON body.
    fn ask(&self, request: &AskRequest)
        -> impl Future<Output = Result<Value, TransportError>> + Send;

    /// Probe the service root.
    fn health_check(&self) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

// =============================================================================
// HTTP
// =============================================================================

/// reqwest-backed client for the answering service.
#[derive(Debug, Clone)]
pub struct HttpAnswerService {
    client: reqwest::Client,
    ask_url: String,
    health_url: String,
}

impl HttpAnswerService {
    pub fn new(config: &ServiceConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::new(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            ask_url: config.ask_url(),
            health_url: config.health_url(),
        })
    }

    pub fn ask_url(&self) -> &str {
        &self.ask_url
    }
}

impl AnswerService for HttpAnswerService {
    async fn ask(&self, request: &AskRequest) -> Result<Value, TransportError> {
        debug!(url = %self.ask_url, history = request.chat_history.len(), "Posting prompt");
        let response = self
            .client
            .post(&self.ask_url)
            .json(request)
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }

    async fn health_check(&self) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }
}

fn send_error(err: reqwest::Error) -> TransportError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect to the answering service: {}", err)
    } else {
        err.to_string()
    };
    warn!(error = %err, "Request to answering service failed");
    TransportError::new(message)
}

/// Read a body as JSON, mapping non-2xx statuses and bad bodies uniformly.
async fn read_json(response: reqwest::Response) -> Result<Value, TransportError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| TransportError::with_status(status.as_u16(), e.to_string(), None))?;

    if !status.is_success() {
        let detail = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body.get("detail").cloned().or(Some(body)),
            Err(_) if text.is_empty() => None,
            Err(_) => Some(Value::String(text)),
        };
        let reason = status.canonical_reason().unwrap_or("request failed");
        warn!(status = status.as_u16(), "Answering service returned an error status");
        return Err(TransportError::with_status(status.as_u16(), reason, detail));
    }

    serde_json::from_str(&text).map_err(|e| {
        TransportError::with_status(
            status.as_u16(),
            format!("response body is not JSON: {}", e),
            Some(Value::String(text)),
        )
    })
}

// =============================================================================
// Mock
// =============================================================================

/// Scripted answering service.
///
/// Replies are served in order; once the script runs out every call gets a
/// plain `{"response": "ok"}`. Each request is recorded.
#[derive(Debug, Default)]
pub struct MockAnswerService {
    replies: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<AskRequest>>,
    calls: AtomicUsize,
}

impl MockAnswerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Result<Value, TransportError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, reply: Result<Value, TransportError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AskRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl AnswerService for MockAnswerService {
    async fn ask(&self, request: &AskRequest) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let reply = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        // Suspend once so concurrent callers observe the in-flight turn.
        tokio::task::yield_now().await;
        reply.unwrap_or_else(|| Ok(json!({ "response": "ok" })))
    }

    async fn health_check(&self) -> Result<Value, TransportError> {
        Ok(json!({ "message": "mock answering service" }))
    }
}
