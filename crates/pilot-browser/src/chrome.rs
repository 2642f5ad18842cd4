use crate::scripts::{self, LABEL_ATTRIBUTE};
use crate::{BrowserDriver, ElementInfo, LabeledElement};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// How to reach and launch Chrome.
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    /// Port chromedriver listens on.
    pub port: u16,
    pub headless: bool,
    /// Chrome binary to launch instead of the system default.
    pub binary: Option<String>,
    pub window_size: (u32, u32),
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            port: 9515,
            headless: false,
            binary: None,
            window_size: (1280, 900),
        }
    }
}

impl ChromeOptions {
    fn capabilities(&self) -> serde_json::Map<String, Value> {
        let mut args = vec![
            // Unique profile so a running Chrome does not hold the lock
            format!("--user-data-dir=/tmp/pilot-chrome-{}", std::process::id()),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-infobars".to_string(),
            "--lang=en-US,en".to_string(),
        ];
        if self.headless {
            args.extend([
                "--headless=new".to_string(),
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ]);
        }

        let mut chrome_options = serde_json::Map::new();
        chrome_options.insert(
            "args".to_string(),
            Value::Array(args.into_iter().map(Value::String).collect()),
        );
        chrome_options.insert(
            "excludeSwitches".to_string(),
            Value::Array(vec![Value::String("enable-automation".to_string())]),
        );
        chrome_options.insert("useAutomationExtension".to_string(), Value::Bool(false));
        if let Some(binary) = &self.binary {
            chrome_options.insert("binary".to_string(), Value::String(binary.clone()));
        }

        let mut caps = serde_json::Map::new();
        caps.insert(
            "browserName".to_string(),
            Value::String("chrome".to_string()),
        );
        caps.insert(
            "goog:chromeOptions".to_string(),
            Value::Object(chrome_options),
        );
        caps
    }
}

/// Chrome driven through a chromedriver WebDriver endpoint.
pub struct ChromeDriver {
    client: Client,
}

impl ChromeDriver {
    /// Open a new browser session on an already running chromedriver.
    pub async fn connect(options: &ChromeOptions) -> Result<Self> {
        let url = format!("http://localhost:{}", options.port);

        let mut builder = ClientBuilder::native();
        let connect_future = builder.capabilities(options.capabilities()).connect(&url);

        let client = tokio::time::timeout(Duration::from_secs(30), connect_future)
            .await
            .context("Connection to ChromeDriver timed out after 30 seconds")?
            .context("Failed to connect to ChromeDriver")?;

        let driver = Self { client };
        // Best effort, some pages refuse injected scripts
        let _ = driver.client.execute(scripts::STEALTH, vec![]).await;

        Ok(driver)
    }

    async fn run_on(&self, script: &str, element: &Element) -> Result<Value> {
        let arg = serde_json::to_value(element).context("Failed to serialize element reference")?;
        Ok(self.client.execute(script, vec![arg]).await?)
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.client.goto(url).await?;
        let _ = self.client.execute(scripts::STEALTH, vec![]).await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn back(&mut self) -> Result<()> {
        self.client.back().await?;
        Ok(())
    }

    async fn viewport_height(&mut self) -> Result<i64> {
        let value = self.client.execute(scripts::VIEWPORT_HEIGHT, vec![]).await?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|h| h as i64))
            .with_context(|| format!("Unexpected window.innerHeight value: {}", value))
    }

    async fn scroll_window_by(&mut self, dy: i64) -> Result<()> {
        self.client
            .execute(&format!("window.scrollBy(0, {});", dy), vec![])
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: &Element) -> Result<()> {
        self.run_on(scripts::SCROLL_INTO_VIEW, element).await?;
        Ok(())
    }

    async fn force_same_tab(&mut self, element: &Element) -> Result<()> {
        self.run_on(scripts::FORCE_SAME_TAB, element).await?;
        Ok(())
    }

    async fn native_click(&mut self, element: &Element) -> Result<()> {
        element.click().await?;
        Ok(())
    }

    async fn script_click(&mut self, element: &Element) -> Result<()> {
        self.run_on(scripts::CLICK, element).await?;
        Ok(())
    }

    async fn clear(&mut self, element: &Element) -> Result<()> {
        element.clear().await?;
        Ok(())
    }

    async fn focus(&mut self, element: &Element) -> Result<()> {
        self.run_on(scripts::FOCUS, element).await?;
        Ok(())
    }

    async fn send_keys(&mut self, element: &Element, text: &str) -> Result<()> {
        element.send_keys(text).await?;
        Ok(())
    }

    async fn suppress_space_scroll(&mut self) -> Result<()> {
        self.client
            .execute(scripts::SUPPRESS_SPACE_SCROLL, vec![])
            .await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn page_text(&mut self) -> Result<String> {
        let value = self.client.execute(scripts::PAGE_TEXT, vec![]).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn label_elements(&mut self) -> Result<Vec<LabeledElement<Element>>> {
        let value = self
            .client
            .execute(scripts::LABEL_ELEMENTS, vec![])
            .await
            .context("Failed to run the labelling script")?;
        let infos: Vec<ElementInfo> =
            serde_json::from_value(value).context("Labelling script returned an unexpected shape")?;

        let tagged = self
            .client
            .find_all(Locator::Css(&format!("[{}]", LABEL_ATTRIBUTE)))
            .await?;
        let mut by_label = HashMap::with_capacity(tagged.len());
        for element in tagged {
            if let Some(label) = element.attr(LABEL_ATTRIBUTE).await? {
                by_label.insert(label, element);
            }
        }

        let mut labeled = Vec::with_capacity(infos.len());
        for info in infos {
            match by_label.remove(&info.label) {
                Some(element) => labeled.push(LabeledElement {
                    description: info.describe(),
                    label: info.label,
                    element,
                }),
                None => warn!("Labelled element [{}] vanished before lookup", info.label),
            }
        }

        debug!("Labelled {} interactive elements", labeled.len());
        Ok(labeled)
    }

    async fn clear_overlays(&mut self) -> Result<()> {
        self.client.execute(scripts::CLEAR_OVERLAYS, vec![]).await?;
        Ok(())
    }

    async fn quit(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}
