//! Decision-service client for the pilot browser agent.
//!
//! The remote service speaks a chat-completion-shaped protocol: the agent sends
//! its turn history plus a tool catalogue and gets back an assistant message,
//! usually carrying one tool call. This crate owns the wire types, the
//! response normalization rules and the session continuation rule.

mod error;
pub mod mock;
pub mod normalize;
pub mod remote;
pub mod session;

pub use error::TransportError;
pub use mock::{MockProvider, MockResponse, RecordedRequest};
pub use normalize::{normalize_content, unwrap_envelope, ContentShape, NormalizedContent};
pub use remote::{RemoteProvider, SessionProgram};
pub use session::{session_after_turn, FinishReason, SessionToken, SESSION_HEADER};

use serde::{Deserialize, Serialize};

/// A source of remote decisions.
///
/// Each call is self-contained: the caller passes the continuation token it
/// holds and receives the token to use next, so no session state hides inside
/// the provider.
#[async_trait::async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Send the conversation and return the normalized response plus the
    /// session token for the following call.
    async fn complete(
        &self,
        request: CompletionRequest,
        session: Option<&SessionToken>,
    ) -> Result<Exchange, TransportError>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model name
    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<Tool>>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub reasoning_effort: Option<String>,
    pub tool_choice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// One turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            role,
            content,
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn with_image(mut self, image: ImageContent) -> Self {
        self.images.push(image);
        self
    }

    pub fn assistant(content: String, tool_call: Option<ToolCall>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, content);
        msg.tool_calls.extend(tool_call);
        msg
    }

    pub fn tool_result(tool_call_id: &str, content: String) -> Self {
        let mut msg = Self::new(MessageRole::Tool, content);
        msg.tool_call_id = Some(tool_call_id.to_string());
        msg
    }
}

/// Image content for multimodal messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    /// Media type (e.g., "image/png")
    pub media_type: String,
    /// Base64-encoded image data
    pub data: String,
}

impl ImageContent {
    pub fn png(data: String) -> Self {
        Self {
            media_type: "image/png".to_string(),
            data,
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The stable contract every backend response shape is normalized into.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub content: String,
    pub content_shape: ContentShape,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub model: String,
}

impl CompletionResponse {
    /// The first tool call, which is the only one the agent acts on.
    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }
}

/// Result of one decision call: the response and the token for the next call.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: CompletionResponse,
    pub next_session: Option<SessionToken>,
}
