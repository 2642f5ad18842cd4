use serde_json::{Map, Value};

/// Payload of a tool turn. Serialized as one JSON object; the enrichment
/// fields only appear when they carry something.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub message: String,
    /// `data:` URL of a fresh screenshot
    pub screenshot: Option<String>,
    /// One `[label]: description` line per interactive element
    pub web_elements: Option<String>,
    /// Full visible page text
    pub website_texts: Option<String>,
}

impl ToolResult {
    pub fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_screenshot(mut self, data_url: String) -> Self {
        self.screenshot = non_empty(data_url);
        self
    }

    pub fn with_web_elements(mut self, digest: String) -> Self {
        self.web_elements = non_empty(digest);
        self
    }

    pub fn with_website_texts(mut self, text: String) -> Self {
        self.website_texts = non_empty(text);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(self.success));
        map.insert("message".to_string(), Value::String(self.message.clone()));
        let optional = [
            ("screenshot", &self.screenshot),
            ("web_elements", &self.web_elements),
            ("website_texts", &self.website_texts),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        Value::Object(map)
    }

    /// The tool turn's content.
    pub fn to_content(&self) -> String {
        self.to_value().to_string()
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}
