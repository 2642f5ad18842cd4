use pilot_providers::TransportError;
use thiserror::Error;

use crate::conversation::ConversationError;

/// Errors that end a task outright. Failed actions and stuck detection are
/// outcomes, not errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Decision call failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Browser error: {0:#}")]
    Browser(#[from] anyhow::Error),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Configuration error: {0}")]
    Config(String),
}
