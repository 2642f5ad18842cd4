pub mod action;
pub mod agent;
pub mod artifacts;
pub mod conversation;
pub mod decision;
pub mod error;
pub mod executor;
pub mod observation;
pub mod progress;
pub mod prompts;
pub mod resolver;
pub mod tool_result;
pub mod tools;

pub use action::{Action, ActionParseError, ScrollDirection, ScrollTarget};
pub use agent::{Agent, AgentSettings, FailureReason, TaskOutcome, TaskStatus};
pub use artifacts::RunArtifacts;
pub use conversation::{Conversation, ConversationError};
pub use decision::{DecisionSource, ToolCallingSource};
pub use error::AgentError;
pub use executor::{ActionExecutor, ActionOutcome, ExecutorState, SettleDelays, StepReport};
pub use observation::{perceive, Observation};
pub use progress::{ProgressTracker, ProgressVerdict, StuckReason, STUCK_THRESHOLD};
pub use resolver::{ElementNotFound, LabelSet};
pub use tool_result::ToolResult;
pub use tools::create_tool_definitions;
