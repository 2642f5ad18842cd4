//! Response normalization.
//!
//! The decision service returns chat-completion payloads in several shapes:
//! optionally wrapped in an envelope, with message content that may be plain
//! text, a JSON-encoded `final_return_value` wrapper, or a mapping printed
//! with single quotes. Every decoder here is a pure function; none of them
//! fails, the worst case is the raw string.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{CompletionResponse, FinishReason, ToolCall, Usage};

/// Outer key some deployments wrap the real payload in.
pub const ENVELOPE_KEY: &str = "final_response";

/// Which decoder produced the normalized content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentShape {
    /// JSON `{"final_return_value": {"value": V}}`
    Structured,
    /// A mapping printed with non-JSON quoting, converted best-effort.
    QuasiMapping,
    /// Passed through untouched.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    pub text: String,
    pub shape: ContentShape,
}

/// Remove the envelope if present; any other payload is returned as-is.
pub fn unwrap_envelope(mut payload: Value) -> Value {
    if let Value::Object(map) = &mut payload {
        if let Some(inner) = map.remove(ENVELOPE_KEY) {
            debug!("Unwrapped '{}' envelope", ENVELOPE_KEY);
            return inner;
        }
    }
    payload
}

/// Normalize message content: structured wrapper first, then quasi-JSON
/// mapping, then the raw string.
pub fn normalize_content(content: &str) -> NormalizedContent {
    if let Some(text) = decode_structured(content) {
        return NormalizedContent {
            text,
            shape: ContentShape::Structured,
        };
    }
    if let Some(text) = decode_quasi_mapping(content) {
        return NormalizedContent {
            text,
            shape: ContentShape::QuasiMapping,
        };
    }
    NormalizedContent {
        text: content.to_string(),
        shape: ContentShape::Raw,
    }
}

fn extract_return_value(parsed: &Value) -> Option<&Value> {
    parsed.get("final_return_value")?.get("value")
}

fn decode_structured(content: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(content).ok()?;
    extract_return_value(&parsed).map(format_value)
}

fn decode_quasi_mapping(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if !(trimmed.starts_with("{'") || trimmed.starts_with("{\"")) {
        return None;
    }
    let json = quasi_mapping_to_json(trimmed)?;
    let parsed: Value = serde_json::from_str(&json).ok()?;
    if !parsed.is_object() {
        return None;
    }
    Some(match extract_return_value(&parsed) {
        Some(value) => format_value(value),
        None => format_value(&parsed),
    })
}

/// Render an extracted value. Mappings with thought/action fields become the
/// two-line `Thought:`/`Action:` form; everything else is stringified.
pub fn format_value(value: &Value) -> String {
    let Value::Object(map) = value else {
        return stringify(value);
    };

    let field = |name: &str| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, v)| stringify(v))
            .filter(|s| !s.is_empty())
    };

    let mut parts = Vec::new();
    if let Some(thought) = field("thought") {
        parts.push(format!("Thought: {}", thought));
    }
    if let Some(action) = field("action") {
        parts.push(format!("Action: {}", action));
    }

    if parts.is_empty() {
        value.to_string()
    } else {
        parts.join("\n")
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Convert a mapping printed with single-quoted strings and `True`/`False`/
/// `None` literals into JSON text. Returns `None` when the quoting is
/// unbalanced.
pub fn quasi_mapping_to_json(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    // The quote character of the string we are inside, if any.
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => match c {
                '\\' => {
                    let next = chars.next()?;
                    if q == '\'' && next == '\'' {
                        out.push('\'');
                    } else {
                        out.push('\\');
                        out.push(next);
                    }
                }
                '"' if q == '\'' => out.push_str("\\\""),
                c if c == q => {
                    out.push('"');
                    quote = None;
                }
                c => out.push(c),
            },
            None => match c {
                '\'' | '"' => {
                    out.push('"');
                    quote = Some(c);
                }
                c if c.is_ascii_alphabetic() => {
                    let mut word = String::from(c);
                    while let Some(&n) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            word.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push_str(match word.as_str() {
                        "True" => "true",
                        "False" => "false",
                        "None" => "null",
                        other => other,
                    });
                }
                c => out.push(c),
            },
        }
    }

    if quote.is_some() {
        return None;
    }
    Some(out)
}

/// Parse tool-call arguments into a structured value. Arguments arrive either
/// as a JSON-encoded string or as an object; anything unparseable becomes an
/// empty object.
pub fn parse_arguments(raw: &Value) -> Value {
    match raw {
        Value::Object(_) => raw.clone(),
        Value::Null => Value::Object(Default::default()),
        Value::String(s) if s.trim().is_empty() => Value::Object(Default::default()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => parsed,
            Ok(other) => {
                warn!("Tool arguments are not an object ({}), using empty arguments", other);
                Value::Object(Default::default())
            }
            Err(e) => {
                warn!("Failed to parse tool arguments '{}': {}", s, e);
                Value::Object(Default::default())
            }
        },
        other => {
            warn!("Unexpected tool arguments shape: {}", other);
            Value::Object(Default::default())
        }
    }
}

/// Decode a full response payload into the stable contract. Never fails: a
/// payload that does not match the expected structure yields an empty
/// response with `FinishReason::Missing`.
pub fn parse_completion(payload: Value, fallback_model: &str) -> CompletionResponse {
    let payload = unwrap_envelope(payload);
    let wire: WireResponse = match serde_json::from_value(payload) {
        Ok(wire) => wire,
        Err(e) => {
            warn!("Malformed completion payload, treating as empty: {}", e);
            WireResponse::default()
        }
    };

    let choice = wire.choices.into_iter().next();
    let finish_reason = match &choice {
        Some(choice) => match &choice.finish_reason {
            Some(reason) => FinishReason::parse(reason),
            None => FinishReason::Missing,
        },
        None => FinishReason::Missing,
    };

    let message = choice.and_then(|c| c.message).unwrap_or_default();
    let raw_content = content_text(message.content.as_ref());
    let normalized = normalize_content(&raw_content);

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let function = tc.function.unwrap_or_default();
            ToolCall {
                id: tc.id.unwrap_or_default(),
                name: function.name.unwrap_or_default(),
                arguments: parse_arguments(&function.arguments),
            }
        })
        .collect();

    let usage = wire.usage.unwrap_or_default();

    CompletionResponse {
        id: wire.id.unwrap_or_default(),
        content: normalized.text,
        content_shape: normalized.shape,
        tool_calls,
        finish_reason,
        usage: Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        },
        model: wire.model.unwrap_or_else(|| fallback_model.to_string()),
    }
}

fn content_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

// Wire structures, deliberately lenient.
#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default = "default_finish_reason")]
    finish_reason: Option<String>,
}

fn default_finish_reason() -> Option<String> {
    Some("stop".to_string())
}

#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunction>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}
