use anyhow::Result;
use base64::Engine;
use pilot_browser::BrowserDriver;
use tracing::{debug, warn};

use crate::resolver::LabelSet;

/// One perception snapshot. Its labels are the only valid ones until the next.
pub struct Observation<E> {
    pub screenshot: Vec<u8>,
    pub labels: LabelSet<E>,
    /// Only captured when the caller asked for it.
    pub page_text: Option<String>,
}

impl<E> Observation<E> {
    pub fn screenshot_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.screenshot)
    }

    pub fn screenshot_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.screenshot_base64())
    }
}

/// Label the page, capture it with the overlays visible, then remove them.
pub async fn perceive<B: BrowserDriver>(
    browser: &mut B,
    epoch: u64,
    with_text: bool,
) -> Result<Observation<B::Element>> {
    let elements = browser.label_elements().await?;
    let screenshot = browser.screenshot().await?;
    if let Err(e) = browser.clear_overlays().await {
        warn!("Failed to remove label overlays: {}", e);
    }

    let page_text = if with_text {
        match browser.page_text().await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Failed to capture website_texts: {}", e);
                Some(String::new())
            }
        }
    } else {
        None
    };

    debug!(
        "Observation {}: {} labelled elements",
        epoch,
        elements.len()
    );

    Ok(Observation {
        screenshot,
        labels: LabelSet::new(epoch, elements),
        page_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_browser::{BrowserCall, MockBrowser};

    #[tokio::test]
    async fn test_perceive_labels_captures_then_clears() {
        let mut browser = MockBrowser::new()
            .with_page("https://a.test", &[("search", "<input> Search")])
            .with_page_text("https://a.test", "Welcome");
        browser.navigate("https://a.test").await.unwrap();

        let observation = perceive(&mut browser, 3, true).await.unwrap();
        assert_eq!(observation.labels.epoch(), 3);
        assert_eq!(observation.labels.digest(), "[0]: <input> Search");
        assert_eq!(observation.page_text.as_deref(), Some("Welcome"));
        assert!(observation.screenshot_data_url().starts_with("data:image/png;base64,"));

        assert_eq!(
            &browser.calls()[1..],
            &[
                BrowserCall::LabelElements,
                BrowserCall::Screenshot,
                BrowserCall::ClearOverlays,
                BrowserCall::PageText
            ]
        );
    }

    #[tokio::test]
    async fn test_page_text_skipped_unless_requested() {
        let mut browser = MockBrowser::new();
        let observation = perceive(&mut browser, 1, false).await.unwrap();
        assert!(observation.page_text.is_none());
        assert!(!browser.calls().contains(&BrowserCall::PageText));
    }
}
