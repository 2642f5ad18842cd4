//! Scriptable in-memory browser for tests.
//!
//! Pages are keyed by URL; each page lists its interactive elements. Clicks can
//! be wired to navigate, and individual primitives can be made to fail for a
//! given element so fallback paths can be exercised. Every call is logged.

use crate::{BrowserDriver, LabeledElement};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockElement {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCall {
    Navigate(String),
    Back,
    ViewportHeight,
    ScrollWindowBy(i64),
    ScrollIntoView(String),
    ForceSameTab(String),
    NativeClick(String),
    ScriptClick(String),
    Clear(String),
    Focus(String),
    SendKeys(String, String),
    SuppressSpaceScroll,
    Screenshot,
    PageText,
    LabelElements,
    ClearOverlays,
    Quit,
}

/// Primitives that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    NativeClick,
    ScriptClick,
    Clear,
    SendKeys,
    ScrollIntoView,
}

pub const MOCK_PNG: &[u8] = b"\x89PNG\r\n\x1a\nmock";

#[derive(Debug)]
pub struct MockBrowser {
    url: String,
    history: Vec<String>,
    viewport_height: i64,
    scroll_y: i64,
    pages: HashMap<String, Vec<(String, String)>>,
    page_texts: HashMap<String, String>,
    click_targets: HashMap<String, String>,
    failures: HashSet<(Primitive, String)>,
    calls: Vec<BrowserCall>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            url: "about:blank".to_string(),
            history: Vec::new(),
            viewport_height: 900,
            scroll_y: 0,
            pages: HashMap::new(),
            page_texts: HashMap::new(),
            click_targets: HashMap::new(),
            failures: HashSet::new(),
            calls: Vec::new(),
        }
    }

    /// Register the interactive elements `(id, description)` found at `url`.
    pub fn with_page(mut self, url: &str, elements: &[(&str, &str)]) -> Self {
        self.pages.insert(
            url.to_string(),
            elements
                .iter()
                .map(|(id, desc)| (id.to_string(), desc.to_string()))
                .collect(),
        );
        self
    }

    pub fn with_page_text(mut self, url: &str, text: &str) -> Self {
        self.page_texts.insert(url.to_string(), text.to_string());
        self
    }

    /// Clicking `element_id` navigates to `url`.
    pub fn with_click_target(mut self, element_id: &str, url: &str) -> Self {
        self.click_targets
            .insert(element_id.to_string(), url.to_string());
        self
    }

    pub fn with_failure(mut self, primitive: Primitive, element_id: &str) -> Self {
        self.failures.insert((primitive, element_id.to_string()));
        self
    }

    pub fn with_viewport_height(mut self, height: i64) -> Self {
        self.viewport_height = height;
        self
    }

    pub fn calls(&self) -> &[BrowserCall] {
        &self.calls
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scroll_y(&self) -> i64 {
        self.scroll_y
    }

    fn check(&self, primitive: Primitive, element: &MockElement) -> Result<()> {
        if self.failures.contains(&(primitive, element.id.clone())) {
            bail!("{:?} failed on element {}", primitive, element.id);
        }
        Ok(())
    }

    fn go(&mut self, url: String) {
        let previous = std::mem::replace(&mut self.url, url);
        self.history.push(previous);
        self.scroll_y = 0;
    }

    fn follow_click(&mut self, element: &MockElement) {
        if let Some(target) = self.click_targets.get(&element.id).cloned() {
            self.go(target);
        }
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    type Element = MockElement;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.calls.push(BrowserCall::Navigate(url.to_string()));
        self.go(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn back(&mut self) -> Result<()> {
        self.calls.push(BrowserCall::Back);
        if let Some(previous) = self.history.pop() {
            self.url = previous;
            self.scroll_y = 0;
        }
        Ok(())
    }

    async fn viewport_height(&mut self) -> Result<i64> {
        self.calls.push(BrowserCall::ViewportHeight);
        Ok(self.viewport_height)
    }

    async fn scroll_window_by(&mut self, dy: i64) -> Result<()> {
        self.calls.push(BrowserCall::ScrollWindowBy(dy));
        self.scroll_y = (self.scroll_y + dy).max(0);
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: &MockElement) -> Result<()> {
        self.calls.push(BrowserCall::ScrollIntoView(element.id.clone()));
        self.check(Primitive::ScrollIntoView, element)
    }

    async fn force_same_tab(&mut self, element: &MockElement) -> Result<()> {
        self.calls.push(BrowserCall::ForceSameTab(element.id.clone()));
        Ok(())
    }

    async fn native_click(&mut self, element: &MockElement) -> Result<()> {
        self.calls.push(BrowserCall::NativeClick(element.id.clone()));
        self.check(Primitive::NativeClick, element)?;
        self.follow_click(element);
        Ok(())
    }

    async fn script_click(&mut self, element: &MockElement) -> Result<()> {
        self.calls.push(BrowserCall::ScriptClick(element.id.clone()));
        self.check(Primitive::ScriptClick, element)?;
        self.follow_click(element);
        Ok(())
    }

    async fn clear(&mut self, element: &MockElement) -> Result<()> {
        self.calls.push(BrowserCall::Clear(element.id.clone()));
        self.check(Primitive::Clear, element)
    }

    async fn focus(&mut self, element: &MockElement) -> Result<()> {
        self.calls.push(BrowserCall::Focus(element.id.clone()));
        Ok(())
    }

    async fn send_keys(&mut self, element: &MockElement, text: &str) -> Result<()> {
        self.calls
            .push(BrowserCall::SendKeys(element.id.clone(), text.to_string()));
        self.check(Primitive::SendKeys, element)
    }

    async fn suppress_space_scroll(&mut self) -> Result<()> {
        self.calls.push(BrowserCall::SuppressSpaceScroll);
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.calls.push(BrowserCall::Screenshot);
        Ok(MOCK_PNG.to_vec())
    }

    async fn page_text(&mut self) -> Result<String> {
        self.calls.push(BrowserCall::PageText);
        Ok(self.page_texts.get(&self.url).cloned().unwrap_or_default())
    }

    async fn label_elements(&mut self) -> Result<Vec<LabeledElement<MockElement>>> {
        self.calls.push(BrowserCall::LabelElements);
        let elements = self.pages.get(&self.url).cloned().unwrap_or_default();
        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(i, (id, description))| LabeledElement {
                label: i.to_string(),
                element: MockElement { id },
                description,
            })
            .collect())
    }

    async fn clear_overlays(&mut self) -> Result<()> {
        self.calls.push(BrowserCall::ClearOverlays);
        Ok(())
    }

    async fn quit(mut self) -> Result<()> {
        self.calls.push(BrowserCall::Quit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_labels_follow_current_page() {
        let mut browser = MockBrowser::new()
            .with_page("https://a.test", &[("home", "<a> Home"), ("go", "<button> Go")])
            .with_page("https://b.test", &[("back", "<a> Back")])
            .with_click_target("go", "https://b.test");

        browser.navigate("https://a.test").await.unwrap();
        let labels = browser.label_elements().await.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[1].label, "1");
        assert_eq!(labels[1].element.id, "go");

        browser.native_click(&labels[1].element).await.unwrap();
        assert_eq!(browser.current_url().await.unwrap(), "https://b.test");
        let labels = browser.label_elements().await.unwrap();
        assert_eq!(labels.len(), 1);

        browser.back().await.unwrap();
        assert_eq!(browser.url(), "https://a.test");
    }

    #[tokio::test]
    async fn test_scripted_failure_is_logged() {
        let mut browser = MockBrowser::new().with_failure(Primitive::NativeClick, "x");
        let element = MockElement { id: "x".to_string() };
        assert!(browser.native_click(&element).await.is_err());
        assert!(browser.script_click(&element).await.is_ok());
        assert_eq!(
            browser.calls(),
            &[
                BrowserCall::NativeClick("x".to_string()),
                BrowserCall::ScriptClick("x".to_string())
            ]
        );
    }
}
