//! Integration tests for `RemoteProvider` over real HTTP.
//!
//! CHARACTERIZATION: a local axum server stands in for the decision service.
//! These tests pin what goes over the wire and how replies map back:
//! - the session header is sent exactly when a token is passed in
//! - the response's session header survives a non-stop turn and is dropped
//!   after "stop"
//! - non-2xx replies become `TransportError::Http` with the body kept
//! - a 2xx reply that is not JSON becomes `TransportError::Decode`
//! - an enveloped body is unwrapped before decoding
//!
//! What this test intentionally does NOT assert:
//! - Timeouts (slow, and reqwest's behavior rather than ours)

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pilot_providers::{
    CompletionRequest, DecisionProvider, FinishReason, Message, MessageRole, RemoteProvider,
    SessionToken, TransportError,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Stub decision service
// =============================================================================

struct Reply {
    status: StatusCode,
    session: Option<&'static str>,
    body: String,
}

impl Reply {
    fn ok(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            session: None,
            body,
        }
    }

    fn status(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            session: None,
            body: body.to_string(),
        }
    }

    fn with_session(mut self, session: &'static str) -> Self {
        self.session = Some(session);
        self
    }
}

/// What the service saw on one call.
#[derive(Debug, Clone)]
struct Seen {
    session: Option<String>,
    authorization: Option<String>,
    security_policy: bool,
    body: Value,
}

#[derive(Clone, Default)]
struct Stub {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    fn with_replies(replies: Vec<Reply>) -> Self {
        let stub = Self::default();
        stub.replies.lock().unwrap().extend(replies);
        stub
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn completions(State(stub): State<Stub>, headers: HeaderMap, body: String) -> Response {
    stub.seen.lock().unwrap().push(Seen {
        session: header(&headers, "x-session-id"),
        authorization: header(&headers, "authorization"),
        security_policy: headers.contains_key("x-security-policy"),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });

    let reply = stub
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Reply::status(500, "no reply queued"));
    let mut response = (reply.status, reply.body).into_response();
    if let Some(session) = reply.session {
        response
            .headers_mut()
            .insert("x-session-id", HeaderValue::from_static(session));
    }
    response
}

async fn program(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "session_id": id,
        "program": "click_element(label=\"3\")",
        "pllm_attempts": 2,
    }))
}

/// Serve the stub on an ephemeral port and return its base URL.
async fn serve(stub: Stub) -> String {
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .route("/sessions/:id/program", get(program))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// =============================================================================
// Helpers
// =============================================================================

fn provider(base_url: &str) -> RemoteProvider {
    RemoteProvider::new(
        "test-key".to_string(),
        base_url.to_string(),
        Some("test-model".to_string()),
        Some(Duration::from_secs(5)),
    )
    .unwrap()
}

fn request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![Message::new(MessageRole::User, "Find the price".to_string())],
        ..Default::default()
    }
}

fn completion(finish_reason: &str) -> Value {
    json!({
        "id": "cmpl-1",
        "model": "test-model",
        "choices": [{
            "message": {
                "role": "assistant",
                "content": "Thought: the item is label 3",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "click_element", "arguments": "{\"label\": \"3\"}"}
                }]
            },
            "finish_reason": finish_reason
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

// =============================================================================
// Session threading on the wire
// =============================================================================

#[tokio::test]
async fn test_session_header_round_trip_follows_finish_reason() {
    let stub = Stub::with_replies(vec![
        Reply::ok(completion("tool_calls").to_string()).with_session("sess-1"),
        Reply::ok(completion("stop").to_string()).with_session("sess-1"),
        Reply::ok(completion("tool_calls").to_string()).with_session("sess-2"),
    ]);
    let provider = provider(&serve(stub.clone()).await);

    let first = provider.complete(request(), None).await.unwrap();
    assert_eq!(first.response.finish_reason, FinishReason::ToolCalls);
    assert_eq!(first.next_session, Some(SessionToken::new("sess-1")));

    let second = provider
        .complete(request(), first.next_session.as_ref())
        .await
        .unwrap();
    assert_eq!(second.response.finish_reason, FinishReason::Stop);
    assert!(second.next_session.is_none());

    let third = provider
        .complete(request(), second.next_session.as_ref())
        .await
        .unwrap();
    assert_eq!(third.next_session, Some(SessionToken::new("sess-2")));

    let seen = stub.seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].session, None);
    assert_eq!(seen[1].session.as_deref(), Some("sess-1"));
    assert_eq!(seen[2].session, None);
}

#[tokio::test]
async fn test_request_carries_auth_policy_and_model() {
    let stub = Stub::with_replies(vec![Reply::ok(completion("stop").to_string())]);
    let provider = provider(&serve(stub.clone()).await);

    let exchange = provider.complete(request(), None).await.unwrap();
    assert!(exchange.next_session.is_none());

    let seen = stub.seen().remove(0);
    assert_eq!(seen.authorization.as_deref(), Some("Bearer test-key"));
    assert!(seen.security_policy);
    assert_eq!(seen.body["model"], "test-model");
    assert_eq!(seen.body["messages"][0]["content"], "Find the price");
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn test_error_status_keeps_body() {
    let stub = Stub::with_replies(vec![Reply::status(502, "upstream unavailable")]);
    let provider = provider(&serve(stub).await);

    match provider.complete(request(), None).await {
        Err(TransportError::Http { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, "upstream unavailable");
        }
        other => panic!("expected HTTP error, got {:?}", other.map(|e| e.response)),
    }
}

#[tokio::test]
async fn test_non_json_success_is_decode_error() {
    let stub = Stub::with_replies(vec![Reply::ok("<html>maintenance</html>".to_string())]);
    let provider = provider(&serve(stub).await);

    let err = provider.complete(request(), None).await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)), "got {:?}", err);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    // Bind then drop, so nothing listens on the port.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = provider(&format!("http://{}", addr))
        .complete(request(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Network(_)), "got {:?}", err);
}

// =============================================================================
// Body decoding
// =============================================================================

#[tokio::test]
async fn test_enveloped_body_is_unwrapped() {
    let body = json!({ "final_response": completion("tool_calls") }).to_string();
    let stub = Stub::with_replies(vec![Reply::ok(body).with_session("sess-9")]);
    let provider = provider(&serve(stub).await);

    let exchange = provider.complete(request(), None).await.unwrap();
    let response = exchange.response;
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "click_element");
    assert_eq!(response.tool_calls[0].arguments, json!({"label": "3"}));
    assert_eq!(response.content, "Thought: the item is label 3");
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(exchange.next_session, Some(SessionToken::new("sess-9")));
}

#[tokio::test]
async fn test_session_program_fetch() {
    let provider = provider(&serve(Stub::default()).await);

    let program = provider
        .session_program(&SessionToken::new("sess-4"))
        .await
        .unwrap();
    assert_eq!(program.session_id, "sess-4");
    assert_eq!(program.program.as_deref(), Some("click_element(label=\"3\")"));
    assert_eq!(program.pllm_attempts, Some(2));
}
