//! Mock decision provider for testing
//!
//! Returns queued responses in order and records every request together with
//! the session token it was sent with, so tests can check both the turn
//! history and the continuation rule without a live service.
//!
//! # Example
//!
//! ```rust,ignore
//! use pilot_providers::mock::{MockProvider, MockResponse};
//!
//! let provider = MockProvider::new()
//!     .with_response(MockResponse::tool_call("click_element", json!({"label": "4"})))
//!     .with_response(MockResponse::tool_call("answer", json!({"content": "done"})));
//! ```

use crate::normalize::normalize_content;
use crate::session::{session_after_turn, SessionToken};
use crate::{
    CompletionRequest, CompletionResponse, DecisionProvider, Exchange, FinishReason, ToolCall,
    TransportError, Usage,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static TOOL_CALL_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub enum MockFailure {
    Http { status: u16, body: String },
    Network(String),
}

/// A scripted response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    /// Value of the continuation header the "service" answers with.
    pub session_token: Option<String>,
    pub failure: Option<MockFailure>,
}

impl MockResponse {
    /// Plain assistant text that ends the turn.
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            session_token: None,
            failure: None,
        }
    }

    /// A single tool call, finishing with `tool_calls`.
    pub fn tool_call(name: &str, arguments: serde_json::Value) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call_{}", TOOL_CALL_COUNTER.fetch_add(1, Ordering::SeqCst)),
                name: name.to_string(),
                arguments,
            }],
            finish_reason: FinishReason::ToolCalls,
            session_token: None,
            failure: None,
        }
    }

    /// A transport failure instead of a response.
    pub fn http_error(status: u16, body: &str) -> Self {
        let mut response = Self::text("");
        response.failure = Some(MockFailure::Http {
            status,
            body: body.to_string(),
        });
        response
    }

    pub fn network_error(message: &str) -> Self {
        let mut response = Self::text("");
        response.failure = Some(MockFailure::Network(message.to_string()));
        response
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn with_session(mut self, token: &str) -> Self {
        self.session_token = Some(token.to_string());
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }
}

/// A request as the provider received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: CompletionRequest,
    pub session: Option<SessionToken>,
}

pub struct MockProvider {
    name: String,
    model: String,
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    default_response: Option<MockResponse>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_response: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Add a response to the queue
    pub fn with_response(self, response: MockResponse) -> Self {
        lock(&self.responses).push(response);
        self
    }

    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        lock(&self.responses).extend(responses);
        self
    }

    /// Response used once the queue runs dry
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = Some(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            self.default_response
                .clone()
                .unwrap_or_else(|| MockResponse::text("Mock response (no responses configured)"))
        } else {
            responses.remove(0)
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DecisionProvider for MockProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
        session: Option<&SessionToken>,
    ) -> Result<Exchange, TransportError> {
        lock(&self.requests).push(RecordedRequest {
            request,
            session: session.cloned(),
        });

        let scripted = self.next_response();
        match scripted.failure {
            Some(MockFailure::Http { status, body }) => {
                return Err(TransportError::Http { status, body })
            }
            Some(MockFailure::Network(message)) => return Err(TransportError::Network(message)),
            None => {}
        }

        let normalized = normalize_content(&scripted.content);
        let next_session =
            session_after_turn(scripted.session_token.as_deref(), &scripted.finish_reason);

        let response = CompletionResponse {
            id: format!("mock-{}", TOOL_CALL_COUNTER.fetch_add(1, Ordering::SeqCst)),
            content: normalized.text,
            content_shape: normalized.shape,
            tool_calls: scripted.tool_calls,
            finish_reason: scripted.finish_reason,
            usage: Usage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            },
            model: self.model.clone(),
        };

        Ok(Exchange {
            response,
            next_session,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}
