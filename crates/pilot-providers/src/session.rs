//! Session continuation rule.
//!
//! The decision service hands out an opaque token in a response header. The
//! token is only carried into the next request while the service is still
//! acting on the same turn; a turn that finished with `stop` ends the session.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Header carrying the continuation token, in both directions.
pub const SESSION_HEADER: &str = "X-Session-Id";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend classification of why a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
    /// The response carried no choice at all.
    Missing,
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }

    /// Whether the turn reached its terminal `stop`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FinishReason::Stop)
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::Other(s) => s,
            FinishReason::Missing => "none",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the continuation header, ignoring case.
pub fn session_header_value(headers: &HeaderMap) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.as_str().eq_ignore_ascii_case(SESSION_HEADER))
        .and_then(|(_, value)| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// Decide which token, if any, the next request should carry.
pub fn session_after_turn(token: Option<&str>, finish: &FinishReason) -> Option<SessionToken> {
    let Some(token) = token else {
        warn!("[Session] No session ID found in response headers, next call starts fresh");
        return None;
    };

    if finish.is_terminal() {
        info!(
            "[Session] Turn complete (finish_reason=stop), not caching session ID {}",
            token
        );
        None
    } else {
        info!(
            "[Session] Turn continuing (finish_reason={}), caching session ID {}",
            finish, token
        );
        Some(SessionToken::new(token))
    }
}
