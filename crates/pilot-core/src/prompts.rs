pub const SYSTEM_PROMPT: &str = "You complete the user's goal by looking at screenshots of a web page and taking one action at a time.

Interactive elements carry a numerical label in the top left corner of their box. Refer to elements only by that number.
After every tool call you get the outcome back, followed by a fresh view of the page.

Notes:
- If an action has no visible effect, try something different (for example scroll to reveal more content).
- Take exactly one action per step.
- Call answer() with the result once every part of the task is solved.";

/// Rules appended to every observation turn.
pub const OBSERVATION_RULES: &str = "RULES:
- The labels above belong to THIS observation only. Any action can change the page, and the next observation will number elements differently.
- Never reuse a label from an earlier observation.
- You must call answer() to finish. Saying the task is done without calling answer() does not count.
- If you cannot make progress, say why instead of guessing.
- Prefer direct actions (click_element, type_text, scroll_page, ...) over multi-step plans.";

/// Corrective turn injected when the loop stops making progress.
pub const STUCK_NUDGE: &str = "PLLM_RETRY: The task appears to be stuck with no progress. Please retry with a different approach or strategy.";

/// Stands in for an observation that could not be taken. The label set is
/// empty until the next successful check.
pub fn observation_failed(error: impl std::fmt::Display) -> String {
    format!(
        "The page could not be observed after the last action ({}). No element labels are valid right now; call check_website before acting on an element.",
        error
    )
}

pub fn task_message(task: &str, start_url: &str) -> String {
    format!(
        "Task: {task}

Please navigate to {start_url} and complete the task.

check_website() returns an object with:
- \"screenshot\": the page with numbered labels on interactive elements
- \"web_elements\": ONLY the interactive elements, one per line as \"[label]: <tag> text\"
- \"website_texts\": all visible text on the page (paragraphs, prices, headings, ...)
- \"success\" and \"message\"

Use web_elements to pick the numeric label to act on and website_texts to read information off the page. Labels change after every action, so check again before reusing one."
    )
}

pub fn observation_message(element_digest: &str) -> String {
    format!(
        "Observation: current page state. Continue working toward the original task.\n\nWeb elements (label: text content):\n{}\n\n{}",
        if element_digest.is_empty() {
            "(no interactive elements found)"
        } else {
            element_digest
        },
        OBSERVATION_RULES
    )
}
