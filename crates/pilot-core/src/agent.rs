//! The perceive-decide-act loop.
//!
//! One iteration: ask the decision source for a move, turn the tool call into
//! an [`Action`], run it, answer the call, refresh perception per the refresh
//! policy, then let the progress tracker judge the step. The loop ends on an
//! answer, a missing tool call, a stuck verdict or the iteration bound.

use pilot_browser::BrowserDriver;
use pilot_config::{AgentConfig, RefreshPolicy, StuckPolicy};
use pilot_providers::{Exchange, SessionToken};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::artifacts::RunArtifacts;
use crate::conversation::Conversation;
use crate::decision::DecisionSource;
use crate::error::AgentError;
use crate::executor::{settle, ActionExecutor, ActionOutcome, SettleDelays};
use crate::observation::{perceive, Observation};
use crate::progress::{ProgressTracker, ProgressVerdict, StuckReason};
use crate::prompts::{observation_failed, STUCK_NUDGE, SYSTEM_PROMPT};
use crate::resolver::LabelSet;
use crate::tool_result::ToolResult;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub refresh_policy: RefreshPolicy,
    pub stuck_policy: StuckPolicy,
    pub system_prompt: bool,
    pub delays: SettleDelays,
}

impl AgentSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            refresh_policy: config.refresh_policy,
            stuck_policy: config.stuck_policy,
            system_prompt: config.system_prompt,
            delays: SettleDelays::default(),
        }
    }

    pub fn with_delays(mut self, delays: SettleDelays) -> Self {
        self.delays = delays;
        self
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Stuck(StuckReason),
    MaxIterations,
    /// The decision-maker ended its turn without calling a tool.
    NoAction,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Stuck(reason) => write!(f, "stuck ({})", reason),
            FailureReason::MaxIterations => f.write_str("reached the iteration limit"),
            FailureReason::NoAction => f.write_str("model stopped without calling a tool"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Completed { answer: String },
    Failed(FailureReason),
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub iterations: usize,
    /// Assistant text of the last turn that had any.
    pub last_reasoning: Option<String>,
    /// Most recent live session token, kept for post-mortem lookups.
    pub last_session: Option<SessionToken>,
}

impl TaskOutcome {
    pub fn answer(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Completed { answer } => Some(answer),
            TaskStatus::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Completed { .. })
    }
}

/// Bookkeeping for one `run`.
#[derive(Default)]
struct RunState {
    iterations: usize,
    nudges: u32,
    last_reasoning: Option<String>,
    last_session: Option<SessionToken>,
}

impl RunState {
    fn finish(self, status: TaskStatus) -> TaskOutcome {
        TaskOutcome {
            status,
            iterations: self.iterations,
            last_reasoning: self.last_reasoning,
            last_session: self.last_session,
        }
    }
}

pub struct Agent<B: BrowserDriver, D: DecisionSource> {
    browser: B,
    source: D,
    conversation: Conversation,
    tracker: ProgressTracker,
    executor: ActionExecutor,
    settings: AgentSettings,
    artifacts: Option<RunArtifacts>,
    epoch: u64,
}

impl<B: BrowserDriver, D: DecisionSource> Agent<B, D> {
    pub fn new(browser: B, source: D, settings: AgentSettings) -> Self {
        Self {
            browser,
            source,
            conversation: Conversation::new(),
            tracker: ProgressTracker::new(),
            executor: ActionExecutor::new(settings.delays),
            settings,
            artifacts: None,
            epoch: 0,
        }
    }

    pub fn with_artifacts(mut self, artifacts: RunArtifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_browser(self) -> B {
        self.browser
    }

    /// Run one task from a clean conversation. Failed actions and stuck
    /// verdicts come back as a [`TaskOutcome`]. Errors are transport
    /// failures, a start page that cannot be loaded or observed, and
    /// bookkeeping failures. A page check that fails mid-task empties the
    /// label set and is reported to the decision-maker instead.
    pub async fn run(&mut self, task: &str, start_url: &str) -> Result<TaskOutcome, AgentError> {
        self.conversation.reset();
        self.tracker.reset();
        self.epoch = 0;

        if self.settings.system_prompt {
            self.conversation.add_system_prompt(SYSTEM_PROMPT);
        }
        self.conversation.add_task(task, start_url);

        info!("Navigating to {}", start_url);
        self.browser.navigate(start_url).await?;
        settle(self.settings.delays.start).await;

        let observation = self.refresh(false, "screenshot1.png".to_string()).await?;
        self.conversation
            .add_observation(Some(observation.screenshot_base64()), &observation.labels.digest());
        let mut labels = observation.labels;

        let mut state = RunState::default();
        let max_iterations = self.settings.max_iterations;

        for iteration in 1..=max_iterations {
            state.iterations = iteration;
            info!("--- Iteration {}/{} ---", iteration, max_iterations);

            let Exchange {
                response,
                next_session,
            } = self
                .source
                .decide(self.conversation.turns(), self.conversation.session())
                .await?;
            if next_session.is_some() {
                state.last_session = next_session.clone();
            }
            self.conversation.advance_session(next_session);

            if !response.content.is_empty() {
                info!("Reasoning: {}", response.content);
                state.last_reasoning = Some(response.content.clone());
            }
            let tool_call = response.tool_calls.into_iter().next();
            self.conversation
                .record_assistant_turn(response.content, tool_call.clone());

            let Some(call) = tool_call else {
                warn!("No tool call in response, ending task");
                return Ok(state.finish(TaskStatus::Failed(FailureReason::NoAction)));
            };
            info!("Tool call: {}({})", call.name, call.arguments);

            let outcome = match Action::from_tool_call(&call) {
                Ok(action) => {
                    self.executor
                        .execute(&mut self.browser, &action, &labels)
                        .await
                }
                Err(e) => {
                    warn!("Rejected tool call: {}", e);
                    ActionOutcome::failure(e.to_string())
                }
            };
            info!("{}", outcome);

            if let Some(answer) = outcome.answer {
                self.conversation
                    .record_tool_result(&call.id, &ToolResult::new(true, "Task completed"))?;
                info!("Task completed in {} iterations", iteration);
                return Ok(state.finish(TaskStatus::Completed { answer }));
            }

            let result = ToolResult::new(outcome.success, outcome.message.clone());
            if outcome.refresh_requested {
                settle(self.settings.delays.observe).await;
                match self
                    .refresh(true, format!("screenshot{}_result.png", iteration))
                    .await
                {
                    Ok(observation) => {
                        let result = result
                            .with_screenshot(observation.screenshot_data_url())
                            .with_web_elements(observation.labels.digest())
                            .with_website_texts(
                                observation.page_text.clone().unwrap_or_default(),
                            );
                        self.conversation.record_tool_result(&call.id, &result)?;
                        labels = observation.labels;
                    }
                    Err(e) => {
                        warn!("Page check failed: {}", e);
                        let result = ToolResult::new(
                            false,
                            format!("{}. {}", outcome.message, observation_failed(&e)),
                        );
                        self.conversation.record_tool_result(&call.id, &result)?;
                        labels = LabelSet::empty();
                    }
                }
            } else {
                self.conversation.record_tool_result(&call.id, &result)?;
                if self.settings.refresh_policy == RefreshPolicy::EveryAction {
                    settle(self.settings.delays.observe).await;
                    match self
                        .refresh(false, format!("screenshot{}.png", iteration + 1))
                        .await
                    {
                        Ok(observation) => {
                            self.conversation.add_observation(
                                Some(observation.screenshot_base64()),
                                &observation.labels.digest(),
                            );
                            labels = observation.labels;
                        }
                        Err(e) => {
                            warn!("Observation after action failed: {}", e);
                            self.conversation.add_user_message(observation_failed(&e));
                            labels = LabelSet::empty();
                        }
                    }
                }
            }

            let url = match self.browser.current_url().await {
                Ok(url) => url,
                Err(e) => {
                    warn!("Could not read current URL, skipping progress check: {:#}", e);
                    continue;
                }
            };
            let verdict = self
                .tracker
                .update(&call.name, &call.arguments, outcome.success, &url);
            if let ProgressVerdict::Stuck(reason) = verdict {
                match self.settings.stuck_policy {
                    StuckPolicy::Nudge { max_nudges } if state.nudges < max_nudges => {
                        state.nudges += 1;
                        warn!(
                            "Nudging decision-maker to change strategy ({}/{})",
                            state.nudges, max_nudges
                        );
                        self.conversation.add_user_message(STUCK_NUDGE.to_string());
                        self.tracker.clear_window();
                    }
                    _ => {
                        error!("Task stuck: {}", reason);
                        return Ok(state.finish(TaskStatus::Failed(FailureReason::Stuck(reason))));
                    }
                }
            }
        }

        warn!("Reached max iterations ({})", max_iterations);
        Ok(state.finish(TaskStatus::Failed(FailureReason::MaxIterations)))
    }

    /// New perception epoch. The caller replaces its label set with the one
    /// returned; nothing from the previous epoch survives.
    async fn refresh(
        &mut self,
        with_text: bool,
        screenshot_name: String,
    ) -> Result<Observation<B::Element>, AgentError> {
        self.epoch += 1;
        let observation = perceive(&mut self.browser, self.epoch, with_text).await?;
        debug!(
            "Label set {} replaces previous ({} elements)",
            observation.labels.epoch(),
            observation.labels.len()
        );
        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.save_screenshot(&screenshot_name, &observation.screenshot) {
                warn!("{:#}", e);
            }
        }
        Ok(observation)
    }
}

