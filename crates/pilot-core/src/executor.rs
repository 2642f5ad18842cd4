//! Action executor.
//!
//! Runs one [`Action`] against the browser and reports what happened. Every
//! best-effort sub-step (clearing a field, silencing the space key, the
//! script-click fallback) is recorded as a [`StepReport`] so callers and tests
//! can see which path ran. Driver errors never escape: they become a failed
//! [`ActionOutcome`].

use pilot_browser::{keys, BrowserDriver};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::action::{Action, ScrollDirection, ScrollTarget};
use crate::resolver::LabelSet;

pub const SEARCH_URL: &str = "https://www.google.com";

/// Fixed pauses after each kind of action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    /// Between scrolling an element into view and touching it.
    pub pre_interaction: Duration,
    pub click: Duration,
    pub type_text: Duration,
    pub scroll: Duration,
    pub wait: Duration,
    pub back: Duration,
    pub search: Duration,
    /// After loading the start URL.
    pub start: Duration,
    /// Before taking a fresh observation.
    pub observe: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            pre_interaction: Duration::from_millis(500),
            click: Duration::from_secs(3),
            type_text: Duration::from_secs(5),
            scroll: Duration::from_secs(3),
            wait: Duration::from_secs(5),
            back: Duration::from_secs(2),
            search: Duration::from_secs(2),
            start: Duration::from_secs(3),
            observe: Duration::from_secs(1),
        }
    }
}

impl SettleDelays {
    /// No pauses at all, for tests.
    pub fn instant() -> Self {
        Self {
            pre_interaction: Duration::ZERO,
            click: Duration::ZERO,
            type_text: Duration::ZERO,
            scroll: Duration::ZERO,
            wait: Duration::ZERO,
            back: Duration::ZERO,
            search: Duration::ZERO,
            start: Duration::ZERO,
            observe: Duration::ZERO,
        }
    }
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Whole seconds print bare ("5"), anything finer as a decimal ("0.25").
fn seconds(delay: Duration) -> String {
    if delay.subsec_nanos() == 0 {
        delay.as_secs().to_string()
    } else {
        delay.as_secs_f64().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Executing(&'static str),
    Settled { success: bool },
}

/// One sub-step of an action and whether it worked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: &'static str,
    pub ok: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub steps: Vec<StepReport>,
    /// The caller should take a fresh observation and return it.
    pub refresh_requested: bool,
    /// Set only by the terminal answer action.
    pub answer: Option<String>,
}

impl ActionOutcome {
    fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            steps: Vec::new(),
            refresh_requested: false,
            answer: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    /// Whether `step` ran and succeeded.
    pub fn step_ok(&self, step: &str) -> Option<bool> {
        self.steps.iter().find(|s| s.step == step).map(|s| s.ok)
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.success { "✓" } else { "✗" };
        write!(f, "{} {}", mark, self.message)
    }
}

/// Accumulates step reports while an action runs.
#[derive(Default)]
struct Steps(Vec<StepReport>);

impl Steps {
    fn record<T>(&mut self, step: &'static str, result: &anyhow::Result<T>) -> bool {
        let report = match result {
            Ok(_) => StepReport {
                step,
                ok: true,
                detail: None,
            },
            Err(e) => {
                debug!("Step {} failed: {}", step, e);
                StepReport {
                    step,
                    ok: false,
                    detail: Some(e.to_string()),
                }
            }
        };
        let ok = report.ok;
        self.0.push(report);
        ok
    }
}

pub struct ActionExecutor {
    delays: SettleDelays,
    state: ExecutorState,
}

impl ActionExecutor {
    pub fn new(delays: SettleDelays) -> Self {
        Self {
            delays,
            state: ExecutorState::Idle,
        }
    }

    pub fn state(&self) -> &ExecutorState {
        &self.state
    }

    pub fn delays(&self) -> &SettleDelays {
        &self.delays
    }

    pub async fn execute<B: BrowserDriver>(
        &mut self,
        browser: &mut B,
        action: &Action,
        labels: &LabelSet<B::Element>,
    ) -> ActionOutcome {
        let kind = action.tool_name();
        self.state = ExecutorState::Executing(kind);
        debug!("Executor: idle -> executing({})", kind);

        let mut steps = Steps::default();
        let result = self.dispatch(browser, action, labels, &mut steps).await;
        let mut outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => ActionOutcome::failure(format!("Error executing {}: {}", kind, e)),
        };
        outcome.steps = steps.0;

        self.state = ExecutorState::Settled {
            success: outcome.success,
        };
        debug!("Executor: executing({}) -> settled({})", kind, outcome.success);
        outcome
    }

    async fn dispatch<B: BrowserDriver>(
        &self,
        browser: &mut B,
        action: &Action,
        labels: &LabelSet<B::Element>,
        steps: &mut Steps,
    ) -> anyhow::Result<ActionOutcome> {
        match action {
            Action::Click { label } => {
                let Ok(element) = labels.resolve(label) else {
                    return Ok(not_found(label));
                };
                Ok(self.click(browser, element, label, steps).await)
            }
            Action::Type { label, content } => {
                let Ok(element) = labels.resolve(label) else {
                    return Ok(not_found(label));
                };
                Ok(self.type_text(browser, element, label, content, steps).await)
            }
            Action::Scroll { target, direction } => {
                self.scroll(browser, target, *direction, labels, steps).await
            }
            Action::Wait => {
                settle(self.delays.wait).await;
                Ok(ActionOutcome::new(
                    true,
                    format!("Waited {} seconds", seconds(self.delays.wait)),
                ))
            }
            Action::GoBack => {
                browser.back().await?;
                settle(self.delays.back).await;
                Ok(ActionOutcome::new(true, "Went back to previous page"))
            }
            Action::Search => {
                browser.navigate(SEARCH_URL).await?;
                settle(self.delays.search).await;
                Ok(ActionOutcome::new(true, "Navigated to Google"))
            }
            Action::Check => {
                let mut outcome = ActionOutcome::new(true, "Checked current page state");
                outcome.refresh_requested = true;
                Ok(outcome)
            }
            Action::Answer { content } => {
                let mut outcome =
                    ActionOutcome::new(true, format!("Task complete. Answer: {}", content));
                outcome.answer = Some(content.clone());
                Ok(outcome)
            }
        }
    }

    async fn click<B: BrowserDriver>(
        &self,
        browser: &mut B,
        element: &B::Element,
        label: &str,
        steps: &mut Steps,
    ) -> ActionOutcome {
        steps.record("scroll_into_view", &browser.scroll_into_view(element).await);
        settle(self.delays.pre_interaction).await;
        steps.record("force_same_tab", &browser.force_same_tab(element).await);

        let native = browser.native_click(element).await;
        let outcome = if steps.record("native_click", &native) {
            ActionOutcome::new(true, format!("Clicked element [{}]", label))
        } else {
            if let Err(e) = &native {
                warn!("Normal click failed: {}, trying JS click", e);
            }
            let script = browser.script_click(element).await;
            if steps.record("script_click", &script) {
                ActionOutcome::new(true, format!("Clicked element [{}] (via JS)", label))
            } else {
                ActionOutcome::failure(format!(
                    "Could not click element [{}]: {}",
                    label,
                    script.err().map(|e| e.to_string()).unwrap_or_default()
                ))
            }
        };

        settle(self.delays.click).await;
        outcome
    }

    async fn type_text<B: BrowserDriver>(
        &self,
        browser: &mut B,
        element: &B::Element,
        label: &str,
        content: &str,
        steps: &mut Steps,
    ) -> ActionOutcome {
        steps.record("scroll_into_view", &browser.scroll_into_view(element).await);
        settle(self.delays.pre_interaction).await;

        // Some widgets ignore clear(), so the select-all erase always follows
        steps.record("native_clear", &browser.clear(element).await);
        steps.record(
            "select_all_erase",
            &browser.send_keys(element, &keys::select_all_and_erase()).await,
        );

        let focused = browser.native_click(element).await;
        if !steps.record("focus_click", &focused) {
            let fallback = browser.focus(element).await;
            if !steps.record("script_focus", &fallback) {
                return ActionOutcome::failure(format!(
                    "Could not focus element [{}]: {}",
                    label,
                    fallback.err().map(|e| e.to_string()).unwrap_or_default()
                ));
            }
        }

        steps.record(
            "suppress_space_scroll",
            &browser.suppress_space_scroll().await,
        );

        let mut keystrokes = content.to_string();
        keystrokes.push(keys::RETURN);
        let typed = browser.send_keys(element, &keystrokes).await;
        if !steps.record("type_and_submit", &typed) {
            return ActionOutcome::failure(format!(
                "Could not type into element [{}]: {}",
                label,
                typed.err().map(|e| e.to_string()).unwrap_or_default()
            ));
        }

        settle(self.delays.type_text).await;
        ActionOutcome::new(
            true,
            format!("Typed '{}' into element [{}]", content, label),
        )
    }

    async fn scroll<B: BrowserDriver>(
        &self,
        browser: &mut B,
        target: &ScrollTarget,
        direction: ScrollDirection,
        labels: &LabelSet<B::Element>,
        steps: &mut Steps,
    ) -> anyhow::Result<ActionOutcome> {
        match target {
            ScrollTarget::Window => {
                let height = browser.viewport_height().await?;
                let amount = window_scroll_amount(height, direction);
                browser.scroll_window_by(amount).await?;
            }
            ScrollTarget::Label(label) => {
                let Ok(element) = labels.resolve(label) else {
                    return Ok(not_found(label));
                };
                // Keyboard scrolling reaches custom scroll containers that
                // ignore scrollTop.
                steps.record("focus", &browser.focus(element).await);
                let arrow = match direction {
                    ScrollDirection::Up => keys::ARROW_UP,
                    ScrollDirection::Down => keys::ARROW_DOWN,
                };
                browser
                    .send_keys(element, &keys::chord(keys::ALT, arrow))
                    .await?;
            }
        }

        settle(self.delays.scroll).await;
        Ok(ActionOutcome::new(true, format!("Scrolled {}", direction)))
    }
}

/// Two thirds of the viewport, signed by direction.
pub fn window_scroll_amount(viewport_height: i64, direction: ScrollDirection) -> i64 {
    let amount = viewport_height * 2 / 3;
    match direction {
        ScrollDirection::Down => amount,
        ScrollDirection::Up => -amount,
    }
}

fn not_found(label: &str) -> ActionOutcome {
    let err = crate::resolver::ElementNotFound {
        label: label.to_string(),
    };
    ActionOutcome::failure(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_browser::{BrowserCall, LabeledElement, MockBrowser, MockElement, Primitive};

    fn labels(ids: &[&str]) -> LabelSet<MockElement> {
        LabelSet::new(
            1,
            ids.iter()
                .enumerate()
                .map(|(i, id)| LabeledElement {
                    label: i.to_string(),
                    element: MockElement { id: id.to_string() },
                    description: String::new(),
                })
                .collect(),
        )
    }

    fn executor() -> ActionExecutor {
        ActionExecutor::new(SettleDelays::instant())
    }

    #[test]
    fn test_window_scroll_amount() {
        assert_eq!(window_scroll_amount(900, ScrollDirection::Down), 600);
        assert_eq!(window_scroll_amount(900, ScrollDirection::Up), -600);
        assert_eq!(window_scroll_amount(1000, ScrollDirection::Down), 666);
    }

    #[tokio::test]
    async fn test_click_falls_back_to_script_click() {
        let ids = ["e0", "e1", "e2", "e3", "e4", "e5", "e6", "e7"];
        let mut browser = MockBrowser::new().with_failure(Primitive::NativeClick, "e7");
        let mut executor = executor();

        let outcome = executor
            .execute(
                &mut browser,
                &Action::Click {
                    label: "7".to_string(),
                },
                &labels(&ids),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.message, "Clicked element [7] (via JS)");
        assert_eq!(outcome.step_ok("native_click"), Some(false));
        assert_eq!(outcome.step_ok("script_click"), Some(true));
        assert!(browser.calls().contains(&BrowserCall::ScriptClick("e7".to_string())));
        assert_eq!(executor.state(), &ExecutorState::Settled { success: true });
    }

    #[tokio::test]
    async fn test_click_native_path() {
        let mut browser = MockBrowser::new();
        let outcome = executor()
            .execute(
                &mut browser,
                &Action::Click {
                    label: "0".to_string(),
                },
                &labels(&["only"]),
            )
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Clicked element [0]");
        assert_eq!(outcome.step_ok("script_click"), None);
        assert_eq!(
            browser.calls(),
            &[
                BrowserCall::ScrollIntoView("only".to_string()),
                BrowserCall::ForceSameTab("only".to_string()),
                BrowserCall::NativeClick("only".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_click_fails_when_both_paths_fail() {
        let mut browser = MockBrowser::new()
            .with_failure(Primitive::NativeClick, "a")
            .with_failure(Primitive::ScriptClick, "a");
        let outcome = executor()
            .execute(
                &mut browser,
                &Action::Click {
                    label: "0".to_string(),
                },
                &labels(&["a"]),
            )
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Could not click element [0]"));
    }

    #[tokio::test]
    async fn test_missing_label_is_not_found_without_touching_browser() {
        let mut browser = MockBrowser::new();
        let mut executor = executor();
        let outcome = executor
            .execute(
                &mut browser,
                &Action::Click {
                    label: "9".to_string(),
                },
                &labels(&["a", "b", "c"]),
            )
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Element with label [9] not found");
        assert!(browser.calls().is_empty());
        assert_eq!(executor.state(), &ExecutorState::Settled { success: false });
    }

    #[tokio::test]
    async fn test_type_clears_then_types_and_submits() {
        let mut browser = MockBrowser::new().with_failure(Primitive::Clear, "box");
        let outcome = executor()
            .execute(
                &mut browser,
                &Action::Type {
                    label: "0".to_string(),
                    content: "iphone 15".to_string(),
                },
                &labels(&["box"]),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.message, "Typed 'iphone 15' into element [0]");
        assert_eq!(outcome.step_ok("native_clear"), Some(false));
        assert_eq!(outcome.step_ok("select_all_erase"), Some(true));
        assert_eq!(outcome.step_ok("suppress_space_scroll"), Some(true));
        assert!(browser.calls().contains(&BrowserCall::SendKeys(
            "box".to_string(),
            format!("iphone 15{}", keys::RETURN)
        )));
    }

    #[tokio::test]
    async fn test_type_failure_reported() {
        let mut browser = MockBrowser::new().with_failure(Primitive::SendKeys, "box");
        let outcome = executor()
            .execute(
                &mut browser,
                &Action::Type {
                    label: "0".to_string(),
                    content: "x".to_string(),
                },
                &labels(&["box"]),
            )
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.step_ok("type_and_submit"), Some(false));
    }

    #[tokio::test]
    async fn test_window_scroll_down_on_900px_viewport() {
        let mut browser = MockBrowser::new().with_viewport_height(900);
        let outcome = executor()
            .execute(
                &mut browser,
                &Action::Scroll {
                    target: ScrollTarget::Window,
                    direction: ScrollDirection::Down,
                },
                &LabelSet::empty(),
            )
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Scrolled down");
        assert!(browser.calls().contains(&BrowserCall::ScrollWindowBy(600)));
        assert_eq!(browser.scroll_y(), 600);
    }

    #[tokio::test]
    async fn test_element_scroll_uses_keyboard() {
        let mut browser = MockBrowser::new();
        let outcome = executor()
            .execute(
                &mut browser,
                &Action::Scroll {
                    target: ScrollTarget::Label("0".to_string()),
                    direction: ScrollDirection::Up,
                },
                &labels(&["list"]),
            )
            .await;
        assert!(outcome.success);
        assert_eq!(
            browser.calls(),
            &[
                BrowserCall::Focus("list".to_string()),
                BrowserCall::SendKeys(
                    "list".to_string(),
                    keys::chord(keys::ALT, keys::ARROW_UP)
                ),
            ]
        );
        assert_eq!(browser.scroll_y(), 0);
    }

    #[tokio::test]
    async fn test_navigation_actions() {
        let mut browser = MockBrowser::new();
        let mut executor = executor();
        let none = LabelSet::empty();

        browser.navigate("https://a.test").await.unwrap();
        let outcome = executor.execute(&mut browser, &Action::Search, &none).await;
        assert!(outcome.success);
        assert_eq!(browser.url(), SEARCH_URL);

        let outcome = executor.execute(&mut browser, &Action::GoBack, &none).await;
        assert_eq!(outcome.message, "Went back to previous page");
        assert_eq!(browser.url(), "https://a.test");

        let outcome = executor.execute(&mut browser, &Action::Wait, &none).await;
        assert!(outcome.success);
    }

    #[test]
    fn test_seconds_keep_fractions() {
        assert_eq!(seconds(Duration::from_secs(5)), "5");
        assert_eq!(seconds(Duration::from_millis(1500)), "1.5");
        assert_eq!(seconds(Duration::ZERO), "0");
    }

    #[tokio::test]
    async fn test_wait_reports_sub_second_delay() {
        let mut browser = MockBrowser::new();
        let mut executor = ActionExecutor::new(SettleDelays {
            wait: Duration::from_millis(250),
            ..SettleDelays::instant()
        });

        let outcome = executor
            .execute(&mut browser, &Action::Wait, &LabelSet::empty())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Waited 0.25 seconds");
    }

    #[tokio::test]
    async fn test_check_and_answer() {
        let mut browser = MockBrowser::new();
        let mut executor = executor();
        let none = LabelSet::empty();

        let outcome = executor.execute(&mut browser, &Action::Check, &none).await;
        assert!(outcome.refresh_requested);
        assert!(outcome.answer.is_none());

        let outcome = executor
            .execute(
                &mut browser,
                &Action::Answer {
                    content: "$999".to_string(),
                },
                &none,
            )
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.answer.as_deref(), Some("$999"));
        assert_eq!(outcome.message, "Task complete. Answer: $999");
        assert!(browser.calls().is_empty());
    }
}
