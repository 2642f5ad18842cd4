//! Turn history and session token for one task.
//!
//! Both live in one struct so they can only be reset together. History is
//! append-only; nothing hands out mutable access to a recorded turn.

use pilot_providers::{ImageContent, Message, MessageRole, SessionToken, ToolCall};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

use crate::prompts;
use crate::tool_result::ToolResult;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("No assistant turn issued tool call '{0}'")]
    UnknownToolCall(String),

    #[error("Tool call '{0}' already has a result")]
    DuplicateToolResult(String),
}

#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Message>,
    session: Option<SessionToken>,
    /// Calls issued by the assistant that still await their result.
    open_calls: HashSet<String>,
    answered_calls: HashSet<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn session(&self) -> Option<&SessionToken> {
        self.session.as_ref()
    }

    /// Adopt the token returned by the last decision call.
    pub fn advance_session(&mut self, next: Option<SessionToken>) {
        self.session = next;
    }

    pub fn add_system_prompt(&mut self, prompt: &str) {
        self.turns
            .push(Message::new(MessageRole::System, prompt.to_string()));
    }

    /// First user turn: what to do and where to start.
    pub fn add_task(&mut self, task: &str, start_url: &str) {
        self.add_user_message(prompts::task_message(task, start_url));
    }

    pub fn add_user_message(&mut self, content: String) {
        self.turns.push(Message::new(MessageRole::User, content));
    }

    /// A perception snapshot as a user turn, with the label rules attached.
    pub fn add_observation(&mut self, screenshot_base64: Option<String>, element_digest: &str) {
        let mut message = Message::new(
            MessageRole::User,
            prompts::observation_message(element_digest),
        );
        if let Some(data) = screenshot_base64 {
            message = message.with_image(ImageContent::png(data));
        }
        self.turns.push(message);
    }

    pub fn record_assistant_turn(&mut self, content: String, tool_call: Option<ToolCall>) {
        if let Some(call) = &tool_call {
            self.open_calls.insert(call.id.clone());
        }
        self.turns.push(Message::assistant(content, tool_call));
    }

    /// Answer an open tool call. Each call gets exactly one result.
    pub fn record_tool_result(
        &mut self,
        tool_call_id: &str,
        result: &ToolResult,
    ) -> Result<(), ConversationError> {
        if self.answered_calls.contains(tool_call_id) {
            return Err(ConversationError::DuplicateToolResult(
                tool_call_id.to_string(),
            ));
        }
        if !self.open_calls.remove(tool_call_id) {
            return Err(ConversationError::UnknownToolCall(tool_call_id.to_string()));
        }

        debug!(
            "Tool result for {}: success={} {}",
            tool_call_id, result.success, result.message
        );
        self.answered_calls.insert(tool_call_id.to_string());
        self.turns
            .push(Message::tool_result(tool_call_id, result.to_content()));
        Ok(())
    }

    /// Drop the history and the session token together.
    pub fn reset(&mut self) {
        if let Some(token) = &self.session {
            info!("[Session] Resetting session ID (was: {})", token);
        }
        *self = Self::default();
    }
}
