use pilot_providers::ToolCall;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const CLICK_ELEMENT: &str = "click_element";
pub const TYPE_TEXT: &str = "type_text";
pub const SCROLL_PAGE: &str = "scroll_page";
pub const WAIT: &str = "wait";
pub const GO_BACK: &str = "go_back";
pub const GOOGLE_SEARCH: &str = "google_search";
pub const CHECK_WEBSITE: &str = "check_website";
pub const ANSWER: &str = "answer";

/// Scroll target meaning "the whole window".
pub const WINDOW_TARGET: &str = "WINDOW";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTarget {
    Window,
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        })
    }
}

/// A browser action the decision-maker asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click { label: String },
    Type { label: String, content: String },
    Scroll { target: ScrollTarget, direction: ScrollDirection },
    Wait,
    GoBack,
    Search,
    Check,
    Answer { content: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing argument '{arg}' for {tool}")]
    MissingArgument { tool: String, arg: &'static str },

    #[error("Invalid value {value} for argument '{arg}' of {tool}")]
    InvalidArgument {
        tool: String,
        arg: &'static str,
        value: String,
    },
}

impl Action {
    pub fn from_tool_call(call: &ToolCall) -> Result<Self, ActionParseError> {
        let args = &call.arguments;
        let tool = call.name.as_str();

        let action = match tool {
            CLICK_ELEMENT => Action::Click {
                label: text_arg(tool, args, "label")?,
            },
            TYPE_TEXT => Action::Type {
                label: text_arg(tool, args, "label")?,
                content: text_arg(tool, args, "content")?,
            },
            SCROLL_PAGE => {
                let target = text_arg(tool, args, "target")?;
                let target = if target.eq_ignore_ascii_case(WINDOW_TARGET) {
                    ScrollTarget::Window
                } else {
                    ScrollTarget::Label(target)
                };
                let direction = match text_arg(tool, args, "direction")?.to_ascii_lowercase().as_str() {
                    "up" => ScrollDirection::Up,
                    "down" => ScrollDirection::Down,
                    other => {
                        return Err(ActionParseError::InvalidArgument {
                            tool: tool.to_string(),
                            arg: "direction",
                            value: other.to_string(),
                        })
                    }
                };
                Action::Scroll { target, direction }
            }
            WAIT => Action::Wait,
            GO_BACK => Action::GoBack,
            GOOGLE_SEARCH => Action::Search,
            CHECK_WEBSITE => Action::Check,
            ANSWER => Action::Answer {
                content: text_arg(tool, args, "content")?,
            },
            other => return Err(ActionParseError::UnknownTool(other.to_string())),
        };
        Ok(action)
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Action::Click { .. } => CLICK_ELEMENT,
            Action::Type { .. } => TYPE_TEXT,
            Action::Scroll { .. } => SCROLL_PAGE,
            Action::Wait => WAIT,
            Action::GoBack => GO_BACK,
            Action::Search => GOOGLE_SEARCH,
            Action::Check => CHECK_WEBSITE,
            Action::Answer { .. } => ANSWER,
        }
    }
}

/// Read a string argument. Labels often arrive as JSON numbers, so numbers are
/// accepted and rendered as their decimal text.
fn text_arg(tool: &str, args: &Value, name: &'static str) -> Result<String, ActionParseError> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        None | Some(Value::Null) => Err(ActionParseError::MissingArgument {
            tool: tool.to_string(),
            arg: name,
        }),
        Some(other) => Err(ActionParseError::InvalidArgument {
            tool: tool.to_string(),
            arg: name,
            value: other.to_string(),
        }),
    }
}
