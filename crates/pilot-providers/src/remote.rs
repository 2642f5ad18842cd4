use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::normalize::parse_completion;
use crate::session::{session_after_turn, session_header_value, SessionToken, SESSION_HEADER};
use crate::{
    CompletionRequest, DecisionProvider, Exchange, Message, MessageRole, Tool, TransportError,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const PROGRAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Decision service reached over HTTP.
#[derive(Clone)]
pub struct RemoteProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    max_tokens: Option<u32>,
    security_headers: bool,
    name: String,
}

/// Planner program stored by the service for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgram {
    pub session_id: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub pllm_attempts: Option<u32>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RemoteProvider {
    pub fn new(
        api_key: String,
        base_url: String,
        model: Option<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o".to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            max_tokens: None,
            security_headers: true,
            name: "remote".to_string(),
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_security_headers(mut self, enabled: bool) -> Self {
        self.security_headers = enabled;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers(&self, session: Option<&SessionToken>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if self.security_headers {
            for (name, value) in security_headers() {
                if let Ok(value) = HeaderValue::from_str(&value) {
                    headers.insert(HeaderName::from_static(name), value);
                }
            }
        }

        match session {
            Some(token) => match HeaderValue::from_str(token.as_str()) {
                Ok(value) => {
                    info!("[Session] Reusing session ID: {}", token);
                    headers.insert(HeaderName::from_static("x-session-id"), value);
                }
                Err(_) => {
                    error!("[Session] Session ID {} is not a valid header value, starting fresh", token);
                }
            },
            None => info!("[Session] No session ID, starting fresh"),
        }

        headers
    }

    fn create_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": convert_messages(&request.messages),
        });

        if let Some(max_tokens) = request.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(tools) = &request.tools {
            if !tools.is_empty() {
                body["tools"] = json!(convert_tools(tools));
            }
        }
        if let Some(tool_choice) = &request.tool_choice {
            body["tool_choice"] = json!(tool_choice);
        }
        if let Some(effort) = &request.reasoning_effort {
            body["reasoning_effort"] = json!(effort);
        }

        body
    }

    /// Fetch the planner program the service kept for `session`.
    pub async fn session_program(
        &self,
        session: &SessionToken,
    ) -> Result<SessionProgram, TransportError> {
        let url = format!("{}/sessions/{}/program", self.base_url, session);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(PROGRAM_TIMEOUT)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, PROGRAM_TIMEOUT))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(e, PROGRAM_TIMEOUT))?;

        if !status.is_success() {
            error!(
                "Failed to retrieve program for session {}: HTTP {}",
                session,
                status.as_u16()
            );
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DecisionProvider for RemoteProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
        session: Option<&SessionToken>,
    ) -> Result<Exchange, TransportError> {
        let headers = self.build_headers(session);
        let body = self.create_request_body(&request);
        info!("{}", request_summary(&body));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let err = TransportError::from_reqwest(e, self.timeout);
                error!("API request failed: {}", err);
                err
            })?;

        let status = response.status();
        let session_header = session_header_value(response.headers()).map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            let err = TransportError::Http {
                status: status.as_u16(),
                body: text,
            };
            error!("API request failed: {}", err);
            return Err(err);
        }

        let payload: Value =
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?;
        let response = parse_completion(payload, &self.model);

        debug!(
            "Completion received: finish_reason={}, tool_calls={}, tokens={}",
            response.finish_reason,
            response.tool_calls.len(),
            response.usage.total_tokens
        );

        let next_session = session_after_turn(session_header.as_deref(), &response.finish_reason);

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

/// Fixed policy headers sent alongside every decision call.
fn security_headers() -> [(&'static str, String); 3] {
    let policy = json!({
        "language": "json-sqrt",
        "codes": "[]",
        "allow_undefined_tools": true,
        "fail_fast": true,
        "auto_gen": false,
    });
    let features = json!([{
        "feature_name": "Dual LLM",
        "config_json": json!({"mode": "standard"}).to_string(),
    }]);
    let config = json!({
        "max_nested_session_depth": 2,
        "disable_rllm": false,
        "disable_tllm": true,
    });

    [
        ("x-security-policy", policy.to_string()),
        ("x-security-features", features.to_string()),
        ("x-security-config", config.to_string()),
    ]
}

fn request_summary(body: &Value) -> String {
    let messages = body["messages"].as_array().map(Vec::len).unwrap_or(0);
    let has_images = body["messages"]
        .as_array()
        .map(|msgs| msgs.iter().any(|m| m["content"].is_array()))
        .unwrap_or(false);

    let mut summary = format!(
        "Sending request: model={}, messages={}",
        body["model"].as_str().unwrap_or_default(),
        messages
    );
    if let Some(tools) = body["tools"].as_array() {
        summary.push_str(&format!(", tools={}", tools.len()));
    }
    if has_images {
        summary.push_str(", with_images=true");
    }
    summary
}

fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let content = if msg.images.is_empty() {
                json!(msg.content)
            } else {
                let mut parts = vec![json!({"type": "text", "text": msg.content})];
                parts.extend(msg.images.iter().map(|image| {
                    json!({
                        "type": "image_url",
                        "image_url": {"url": image.data_url()},
                    })
                }));
                Value::Array(parts)
            };

            let mut converted = json!({
                "role": msg.role.as_str(),
                "content": content,
            });

            if msg.role == MessageRole::Assistant && !msg.tool_calls.is_empty() {
                converted["tool_calls"] = msg
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            if let Some(id) = &msg.tool_call_id {
                converted["tool_call_id"] = json!(id);
            }

            converted
        })
        .collect()
}

fn convert_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let mut function = json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            });
            if let Some(output_schema) = &tool.output_schema {
                function["output_schema"] = output_schema.clone();
            }
            json!({
                "type": "function",
                "function": function,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageContent, ToolCall};

    fn provider() -> RemoteProvider {
        RemoteProvider::new(
            "secret".to_string(),
            "https://decider.example/v1/".to_string(),
            Some("gpt-4o".to_string()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(provider().base_url(), "https://decider.example/v1");
    }

    #[test]
    fn test_optional_fields_omitted_when_unset() {
        let request = CompletionRequest {
            messages: vec![Message::new(MessageRole::User, "hi".to_string())],
            ..Default::default()
        };
        let body = provider().create_request_body(&request);
        let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"model"));
        assert!(keys.contains(&"messages"));
    }

    #[test]
    fn test_optional_fields_included_when_set() {
        let request = CompletionRequest {
            messages: vec![],
            seed: Some(42),
            reasoning_effort: Some("low".to_string()),
            tool_choice: Some("auto".to_string()),
            max_tokens: Some(512),
            ..Default::default()
        };
        let body = provider().create_request_body(&request);
        assert_eq!(body["seed"], 42);
        assert_eq!(body["reasoning_effort"], "low");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["max_tokens"], 512);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_tools_carry_output_schema() {
        let tools = vec![Tool {
            name: "check_website".to_string(),
            description: "Look at the page".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
            output_schema: Some(json!({"type": "object"})),
        }];
        let converted = convert_tools(&tools);
        assert_eq!(converted[0]["type"], "function");
        assert_eq!(converted[0]["function"]["name"], "check_website");
        assert_eq!(converted[0]["function"]["output_schema"]["type"], "object");
    }

    #[test]
    fn test_convert_messages_images_and_tool_calls() {
        let messages = vec![
            Message::new(MessageRole::User, "look".to_string())
                .with_image(ImageContent::png("AAAA".to_string())),
            Message::assistant(
                "Thought: click".to_string(),
                Some(ToolCall {
                    id: "call_1".to_string(),
                    name: "click_element".to_string(),
                    arguments: json!({"label": "3"}),
                }),
            ),
            Message::tool_result("call_1", "{\"success\":true}".to_string()),
        ];

        let converted = convert_messages(&messages);
        assert_eq!(converted[0]["content"][0]["text"], "look");
        assert_eq!(
            converted[0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
        assert_eq!(converted[1]["tool_calls"][0]["function"]["arguments"], "{\"label\":\"3\"}");
        assert_eq!(converted[2]["role"], "tool");
        assert_eq!(converted[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_request_summary_never_includes_image_data() {
        let request = CompletionRequest {
            messages: vec![Message::new(MessageRole::User, "look".to_string())
                .with_image(ImageContent::png("SECRETPIXELS".to_string()))],
            ..Default::default()
        };
        let summary = request_summary(&provider().create_request_body(&request));
        assert_eq!(summary, "Sending request: model=gpt-4o, messages=1, with_images=true");
    }

    #[test]
    fn test_headers_with_and_without_session() {
        let p = provider();
        let headers = p.build_headers(None);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
        assert!(headers.get(SESSION_HEADER).is_none());
        assert!(headers.get("x-security-policy").is_some());

        let headers = p.build_headers(Some(&SessionToken::new("sess-9")));
        assert_eq!(headers.get(SESSION_HEADER).unwrap(), "sess-9");
    }

    #[test]
    fn test_security_headers_toggle() {
        let p = provider().with_security_headers(false);
        let headers = p.build_headers(None);
        assert!(headers.get("x-security-features").is_none());
        assert!(headers.get("x-security-config").is_none());
    }

    #[test]
    fn test_security_config_values() {
        let [_, (_, features), (_, config)] = security_headers();
        let features: Value = serde_json::from_str(&features).unwrap();
        assert_eq!(features[0]["feature_name"], "Dual LLM");
        let config: Value = serde_json::from_str(&config).unwrap();
        assert_eq!(config["max_nested_session_depth"], 2);
        assert_eq!(config["disable_tllm"], true);
    }
}
