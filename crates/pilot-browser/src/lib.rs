//! Browser primitives for the pilot agent.
//!
//! `BrowserDriver` is deliberately low level: each method is one WebDriver
//! command or one small script. Interaction policies (fallbacks, settle
//! delays, clearing strategies) live in the agent's executor so they can be
//! tested against `MockBrowser`.

pub mod chrome;
pub mod keys;
pub mod mock;
mod scripts;

pub use chrome::{ChromeDriver, ChromeOptions};
pub use mock::{BrowserCall, MockBrowser, MockElement, Primitive};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An interactive element picked out by a labelling pass.
#[derive(Debug, Clone)]
pub struct LabeledElement<E> {
    /// 0-based index rendered on the overlay, as a string.
    pub label: String,
    pub element: E,
    pub description: String,
}

/// What the labelling script reports for each element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub label: String,
    pub tag: String,
    #[serde(default)]
    pub text: String,
}

impl ElementInfo {
    /// `<tag> text`, or just `<tag>` for elements without text.
    pub fn describe(&self) -> String {
        if self.text.is_empty() {
            format!("<{}>", self.tag)
        } else {
            format!("<{}> {}", self.tag, self.text)
        }
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Handle to a DOM element, only meaningful within one labelling pass.
    type Element: Clone + Send + Sync;

    /// Navigate to a URL
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Get the current URL
    async fn current_url(&self) -> Result<String>;

    /// Go back in browser history
    async fn back(&mut self) -> Result<()>;

    /// `window.innerHeight` in CSS pixels.
    async fn viewport_height(&mut self) -> Result<i64>;

    async fn scroll_window_by(&mut self, dy: i64) -> Result<()>;

    async fn scroll_into_view(&mut self, element: &Self::Element) -> Result<()>;

    /// Retarget links so they open in the current tab.
    async fn force_same_tab(&mut self, element: &Self::Element) -> Result<()>;

    /// A real pointer click through the driver.
    async fn native_click(&mut self, element: &Self::Element) -> Result<()>;

    /// `element.click()` run inside the page.
    async fn script_click(&mut self, element: &Self::Element) -> Result<()>;

    async fn clear(&mut self, element: &Self::Element) -> Result<()>;

    async fn focus(&mut self, element: &Self::Element) -> Result<()>;

    /// Send a key sequence to the element. Special keys use the codepoints in
    /// [`keys`].
    async fn send_keys(&mut self, element: &Self::Element, text: &str) -> Result<()>;

    /// Stop the space bar from scrolling the page unless a text field has focus.
    async fn suppress_space_scroll(&mut self) -> Result<()>;

    /// PNG bytes of the viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    /// Visible text of the whole document.
    async fn page_text(&mut self) -> Result<String>;

    /// Label the visible interactive elements and draw numbered overlays.
    /// Labels from any earlier pass are discarded.
    async fn label_elements(&mut self) -> Result<Vec<LabeledElement<Self::Element>>>;

    /// Remove the overlays drawn by the last labelling pass.
    async fn clear_overlays(&mut self) -> Result<()>;

    /// Quit the browser session
    async fn quit(self) -> Result<()>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let info = ElementInfo {
            label: "2".to_string(),
            tag: "input".to_string(),
            text: "Search".to_string(),
        };
        assert_eq!(info.describe(), "<input> Search");

        let info = ElementInfo {
            text: String::new(),
            ..info
        };
        assert_eq!(info.describe(), "<input>");
    }
}
