//! Tool catalogue offered to the decision service.

use pilot_providers::Tool;
use serde_json::{json, Value};

use crate::action::{
    ANSWER, CHECK_WEBSITE, CLICK_ELEMENT, GOOGLE_SEARCH, GO_BACK, SCROLL_PAGE, TYPE_TEXT, WAIT,
};

/// `{success, message}` output schema shared by the plain actions.
fn status_schema(success: &str, message: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "success": {"type": "boolean", "description": success},
            "message": {"type": "string", "description": message}
        },
        "required": ["success", "message"]
    })
}

fn no_arguments() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

fn tool(name: &str, description: &str, input_schema: Value, output_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        output_schema: Some(output_schema),
    }
}

pub fn create_tool_definitions() -> Vec<Tool> {
    vec![
        tool(
            CLICK_ELEMENT,
            "Click on a web element identified by its numerical label",
            json!({
                "type": "object",
                "properties": {
                    "label": {
                        "type": "string",
                        "description": "The numerical label of the element to click (e.g., '5', '14')"
                    }
                },
                "required": ["label"]
            }),
            status_schema("Whether the click succeeded", "Status message describing the result"),
        ),
        tool(
            TYPE_TEXT,
            "Type content into a textbox element. ENTER is pressed automatically after typing.",
            json!({
                "type": "object",
                "properties": {
                    "label": {"type": "string", "description": "The numerical label of the textbox"},
                    "content": {"type": "string", "description": "The text to type"}
                },
                "required": ["label", "content"]
            }),
            status_schema("Whether typing succeeded", "Status message describing the result"),
        ),
        tool(
            SCROLL_PAGE,
            "Scroll up or down, either the whole window or inside a specific element.",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "'WINDOW' for the whole page, or the numerical label of a scrollable element"
                    },
                    "direction": {"type": "string", "enum": ["up", "down"], "description": "The direction to scroll"}
                },
                "required": ["target", "direction"]
            }),
            status_schema("Whether the scroll succeeded", "Status message describing the result"),
        ),
        tool(
            WAIT,
            "Wait for 5 seconds, typically for unfinished page loads.",
            no_arguments(),
            status_schema("Whether the wait completed", "Status message describing the result"),
        ),
        tool(
            GO_BACK,
            "Go back to the previous page in browser history.",
            no_arguments(),
            status_schema("Whether going back succeeded", "Status message describing the result"),
        ),
        tool(
            GOOGLE_SEARCH,
            "Jump to the Google search page. Use when the current site does not have the information.",
            no_arguments(),
            status_schema("Whether navigating to Google succeeded", "Status message describing the result"),
        ),
        tool(
            CHECK_WEBSITE,
            "Inspect the current page without acting. Returns a fresh labelled screenshot, the list of interactive elements and all visible page text.",
            no_arguments(),
            json!({
                "type": "object",
                "properties": {
                    "success": {"type": "boolean", "description": "Whether checking the page succeeded"},
                    "message": {"type": "string", "description": "Status message"},
                    "screenshot": {"type": "string", "description": "Screenshot with labelled elements"},
                    "web_elements": {
                        "type": "string",
                        "description": "ONLY the interactive elements, one per line as '[label]: <tag> text'. Use these labels to click or type."
                    },
                    "website_texts": {
                        "type": "string",
                        "description": "All visible text on the page. Use this to extract information."
                    }
                },
                "required": ["success", "message", "screenshot", "web_elements", "website_texts"]
            }),
        ),
        tool(
            ANSWER,
            "Give the final answer once every question in the task is solved.",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The final answer"}
                },
                "required": ["content"]
            }),
            status_schema("Whether the task was completed", "Task completion message"),
        ),
    ]
}
