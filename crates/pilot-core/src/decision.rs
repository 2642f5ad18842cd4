use async_trait::async_trait;
use pilot_config::{ProviderConfig, SessionPolicy};
use pilot_providers::{
    CompletionRequest, DecisionProvider, Exchange, Message, SessionToken, Tool, TransportError,
};
use std::sync::Arc;
use tracing::debug;

use crate::tools::create_tool_definitions;

/// Where the agent gets its next move from.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn decide(
        &self,
        turns: &[Message],
        session: Option<&SessionToken>,
    ) -> Result<Exchange, TransportError>;
}

/// Sends the whole conversation plus the tool catalogue to a provider.
pub struct ToolCallingSource {
    provider: Arc<dyn DecisionProvider>,
    tools: Vec<Tool>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    seed: Option<u64>,
    reasoning_effort: Option<String>,
    session_policy: SessionPolicy,
}

impl ToolCallingSource {
    pub fn new(provider: Arc<dyn DecisionProvider>) -> Self {
        Self {
            provider,
            tools: create_tool_definitions(),
            max_tokens: None,
            temperature: None,
            seed: None,
            reasoning_effort: None,
            session_policy: SessionPolicy::Continue,
        }
    }

    /// Sampling settings from the `[provider]` table.
    pub fn with_sampling(mut self, config: &ProviderConfig) -> Self {
        self.max_tokens = config.max_tokens;
        self.temperature = config.temperature;
        self.seed = config.seed;
        self.reasoning_effort = config.reasoning_effort.clone();
        self
    }

    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    fn request(&self, turns: &[Message]) -> CompletionRequest {
        CompletionRequest {
            messages: turns.to_vec(),
            tools: Some(self.tools.clone()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            seed: self.seed,
            reasoning_effort: self.reasoning_effort.clone(),
            tool_choice: Some("auto".to_string()),
        }
    }
}

#[async_trait]
impl DecisionSource for ToolCallingSource {
    async fn decide(
        &self,
        turns: &[Message],
        session: Option<&SessionToken>,
    ) -> Result<Exchange, TransportError> {
        let session = match self.session_policy {
            SessionPolicy::Continue => session,
            SessionPolicy::FreshPerTurn => None,
        };
        debug!(
            "Requesting decision from {} ({} turns)",
            self.provider.name(),
            turns.len()
        );
        self.provider.complete(self.request(turns), session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_providers::{MessageRole, MockProvider, MockResponse};

    #[tokio::test]
    async fn test_request_carries_catalogue_and_sampling() {
        let provider = Arc::new(MockProvider::new().with_response(MockResponse::text("ok")));
        let config = ProviderConfig {
            temperature: Some(0.2),
            seed: Some(7),
            ..Default::default()
        };
        let source = ToolCallingSource::new(provider.clone()).with_sampling(&config);

        let turns = vec![Message::new(MessageRole::User, "hi".to_string())];
        source.decide(&turns, None).await.unwrap();

        let recorded = provider.requests();
        let request = &recorded[0].request;
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.tools.as_ref().map(|t| t.len()), Some(8));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.seed, Some(7));
        assert_eq!(request.max_tokens, Some(2000));
    }

    #[tokio::test]
    async fn test_fresh_per_turn_drops_token() {
        let provider = Arc::new(
            MockProvider::new()
                .with_response(MockResponse::text("a"))
                .with_response(MockResponse::text("b")),
        );
        let token = SessionToken::new("sess-1");

        let source = ToolCallingSource::new(provider.clone());
        source.decide(&[], Some(&token)).await.unwrap();

        let source =
            ToolCallingSource::new(provider.clone()).with_session_policy(SessionPolicy::FreshPerTurn);
        source.decide(&[], Some(&token)).await.unwrap();

        let recorded = provider.requests();
        assert_eq!(recorded[0].session.as_ref(), Some(&token));
        assert_eq!(recorded[1].session, None);
    }
}
