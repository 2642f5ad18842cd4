//! chromedriver lifecycle: reuse one already listening on the port, otherwise
//! spawn it and retry the connection while it starts.

use anyhow::{Context, Result};
use pilot_browser::{ChromeDriver, ChromeOptions};
use pilot_config::WebDriverConfig;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

const CONNECT_RETRIES: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// The chromedriver process, if this run started it.
pub struct ChromedriverHandle {
    process: Option<Child>,
}

impl ChromedriverHandle {
    /// Stop chromedriver if this run spawned it.
    pub async fn shutdown(mut self) {
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill().await {
                warn!("Failed to stop chromedriver: {}", e);
            }
        }
    }
}

pub fn chrome_options(config: &WebDriverConfig) -> ChromeOptions {
    ChromeOptions {
        port: config.chrome_port,
        headless: config.headless,
        binary: config.chrome_binary.clone(),
        ..Default::default()
    }
}

/// Check if chromedriver is already running on the given port.
async fn chromedriver_running(port: u16) -> bool {
    let url = format!("http://localhost:{}/status", port);
    match reqwest::Client::new()
        .get(&url)
        .timeout(Duration::from_millis(500))
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

pub async fn start(config: &WebDriverConfig) -> Result<(ChromeDriver, ChromedriverHandle)> {
    let options = chrome_options(config);
    let port = options.port;

    if chromedriver_running(port).await {
        match ChromeDriver::connect(&options).await {
            Ok(driver) => {
                info!("WebDriver session started (reusing chromedriver on port {})", port);
                return Ok((driver, ChromedriverHandle { process: None }));
            }
            Err(e) => debug!("Existing chromedriver refused a session: {:#}", e),
        }
    }

    let command = config
        .chromedriver_binary
        .as_deref()
        .unwrap_or("chromedriver");
    let mut process = tokio::process::Command::new(command)
        .arg(format!("--port={}", port))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| {
            format!(
                "Failed to start {}. Make sure chromedriver is installed and in your PATH \
                 (macOS: brew install chromedriver, Linux: apt install chromium-chromedriver)",
                command
            )
        })?;

    let mut last_error = None;
    for attempt in 1..=CONNECT_RETRIES {
        tokio::time::sleep(RETRY_DELAY).await;
        match ChromeDriver::connect(&options).await {
            Ok(driver) => {
                info!(
                    "WebDriver session started (headless: {})",
                    options.headless
                );
                return Ok((
                    driver,
                    ChromedriverHandle {
                        process: Some(process),
                    },
                ));
            }
            Err(e) => {
                debug!("Connect attempt {}/{} failed: {:#}", attempt, CONNECT_RETRIES, e);
                last_error = Some(e);
            }
        }
    }

    let _ = process.kill().await;
    let cause = last_error
        .map(|e| format!("{:#}", e))
        .unwrap_or_else(|| "Unknown error".to_string());
    anyhow::bail!(
        "Failed to connect to ChromeDriver after {} attempts: {}. \
         Check that Chrome is installed, that chromedriver matches its version, \
         and that port {} is free.",
        CONNECT_RETRIES,
        cause,
        port
    )
}
