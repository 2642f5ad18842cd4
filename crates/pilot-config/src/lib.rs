use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the decision-service credential.
pub const API_KEY_ENV: &str = "PILOT_API_KEY";
/// Environment variable holding the decision-service base URL.
pub const ENDPOINT_ENV: &str = "PILOT_ENDPOINT";

const DEFAULT_PATHS: [&str; 2] = ["./pilot.toml", "~/.config/pilot/config.toml"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    pub webdriver: WebDriverConfig,
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub reasoning_effort: Option<String>,
    /// Decision calls carry screenshots, so this is generous.
    pub timeout_seconds: u64,
    /// Send the X-Security-* policy headers.
    pub security_headers: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-4o".to_string(),
            max_tokens: Some(2000),
            temperature: None,
            seed: None,
            reasoning_effort: None,
            timeout_seconds: 300,
            security_headers: true,
        }
    }
}

/// When the element labels are rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// A fresh observation follows every action.
    #[default]
    EveryAction,
    /// Labels only change when `check_website` runs.
    OnCheck,
}

/// What happens once the loop is judged stuck.
///
/// ```toml
/// stuck_policy = "abort"
/// # or
/// stuck_policy = { nudge = { max_nudges = 2 } }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckPolicy {
    #[default]
    Abort,
    Nudge { max_nudges: u32 },
}

/// How the continuation token is threaded between decision calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    #[default]
    Continue,
    /// Every decision call starts a new session; history still accumulates.
    FreshPerTurn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub refresh_policy: RefreshPolicy,
    pub stuck_policy: StuckPolicy,
    pub session_policy: SessionPolicy,
    /// Prepend the system prompt. Some backends plan from the task alone.
    pub system_prompt: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            refresh_policy: RefreshPolicy::default(),
            stuck_policy: StuckPolicy::default(),
            session_policy: SessionPolicy::default(),
            system_prompt: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub chrome_port: u16,
    /// Optional path to a Chrome binary (e.g., Chrome for Testing)
    pub chrome_binary: Option<String>,
    /// chromedriver executable; looked up on PATH when unset
    pub chromedriver_binary: Option<String>,
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            chrome_port: 9515,
            chrome_binary: None,
            chromedriver_binary: None,
            headless: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Each run gets a timestamped directory below this one.
    pub results_dir: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            results_dir: "results".to_string(),
        }
    }
}

/// Command-line values that win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
    pub headless: bool,
    pub results_dir: Option<String>,
}

impl Config {
    /// Load from `config_path`, or the first default location that exists.
    /// Falls back to defaults when there is no file at all.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = match config_path {
            Some(path) => {
                let expanded = shellexpand::tilde(path).to_string();
                if !Path::new(&expanded).exists() {
                    anyhow::bail!("Config file not found: {}", path);
                }
                Some(expanded)
            }
            None => DEFAULT_PATHS.iter().find_map(|path| {
                let expanded = shellexpand::tilde(path);
                Path::new(expanded.as_ref())
                    .exists()
                    .then(|| expanded.to_string())
            }),
        };

        match path {
            Some(path) => {
                debug!("Loading config from {}", path);
                let content = std::fs::read_to_string(&path)?;
                Ok(toml::from_str(&content)?)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_with_overrides(config_path: Option<&str>, overrides: &CliOverrides) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Let environment values replace file values. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = lookup(API_KEY_ENV) {
            self.provider.api_key = Some(key);
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV) {
            self.provider.base_url = Some(endpoint);
        }
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(model) = &overrides.model {
            self.provider.model = model.clone();
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.agent.max_iterations = max_iterations;
        }
        if overrides.headless {
            self.webdriver.headless = true;
        }
        if let Some(results_dir) = &overrides.results_dir {
            self.artifacts.results_dir = results_dir.clone();
        }
    }

    /// The `(api_key, base_url)` pair, which must be configured somewhere.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.provider.api_key, &self.provider.base_url) {
            (Some(key), Some(url)) => Ok((key, url)),
            _ => anyhow::bail!(
                "{} and {} must be set (or provider.api_key and provider.base_url in {})",
                API_KEY_ENV,
                ENDPOINT_ENV,
                Self::user_config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "pilot.toml".to_string())
            ),
        }
    }

    /// Per-user config location.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("pilot").join("config.toml"))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }
}
