//! pilot CLI - command-line entry point for the browser agent.

mod cli_args;
mod webdriver;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use pilot_browser::BrowserDriver;
use pilot_config::Config;
use pilot_core::{Agent, AgentSettings, RunArtifacts, TaskOutcome, TaskStatus, ToolCallingSource};
use pilot_providers::RemoteProvider;

pub use cli_args::Cli;

const LOGGED_CRATES: [&str; 6] = [
    "pilot",
    "pilot_cli",
    "pilot_core",
    "pilot_providers",
    "pilot_browser",
    "pilot_config",
];

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration with CLI overrides
    let config = Config::load_with_overrides(cli.config.as_deref(), &cli.overrides())?;

    let artifacts = RunArtifacts::create(&config.artifacts.results_dir)?;
    initialize_logging(&cli, &artifacts.log_path())?;
    info!("Results will be saved to {}", artifacts.dir().display());

    let (api_key, base_url) = config.credentials()?;
    let provider = Arc::new(
        RemoteProvider::new(
            api_key.to_string(),
            base_url.to_string(),
            Some(config.provider.model.clone()),
            Some(Duration::from_secs(config.provider.timeout_seconds)),
        )?
        .with_max_tokens(config.provider.max_tokens)
        .with_security_headers(config.provider.security_headers),
    );
    info!("Using model {} at {}", config.provider.model, provider.base_url());

    let source = ToolCallingSource::new(provider.clone())
        .with_sampling(&config.provider)
        .with_session_policy(config.agent.session_policy);

    let (driver, chromedriver) = webdriver::start(&config.webdriver).await?;
    let mut agent = Agent::new(driver, source, AgentSettings::from_config(&config.agent))
        .with_artifacts(artifacts.clone());

    info!("Task: {}", cli.task);
    let result = agent.run(&cli.task, &cli.url).await;

    if let Err(e) = agent.into_browser().quit().await {
        warn!("Failed to close browser: {:#}", e);
    }
    chromedriver.shutdown().await;

    let outcome = result?;
    report(&outcome);

    match &outcome.status {
        TaskStatus::Completed { answer } => {
            println!("{}", answer);
            Ok(())
        }
        TaskStatus::Failed(reason) => {
            if cli.dump_program {
                dump_program(&provider, &artifacts, &outcome).await;
            }
            anyhow::bail!(
                "Task did not reach an answer: {} (logs in {})",
                reason,
                artifacts.dir().display()
            )
        }
    }
}

// --- Helper functions ---

fn initialize_logging(cli: &Cli, log_path: &Path) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for krate in LOGGED_CRATES {
        if let Ok(directive) = format!("{}={}", krate, level).parse() {
            filter = filter.add_directive(directive);
        }
    }
    for noisy in ["hyper=warn", "fantoccini=warn"] {
        if let Ok(directive) = noisy.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let file = std::fs::File::create(log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn report(outcome: &TaskOutcome) {
    match &outcome.status {
        TaskStatus::Completed { answer } => {
            info!(
                "Task completed after {} iterations. Answer: {}",
                outcome.iterations, answer
            );
        }
        TaskStatus::Failed(reason) => {
            error!(
                "Task failed after {} iterations: {}",
                outcome.iterations, reason
            );
            if let Some(reasoning) = &outcome.last_reasoning {
                error!("Last reasoning: {}", reasoning);
            }
        }
    }
}

async fn dump_program(provider: &RemoteProvider, artifacts: &RunArtifacts, outcome: &TaskOutcome) {
    let Some(session) = &outcome.last_session else {
        warn!("No live session recorded, nothing to dump");
        return;
    };
    match provider.session_program(session).await {
        Ok(program) => {
            if let Err(e) = artifacts.save_program(&program) {
                warn!("{:#}", e);
            }
        }
        Err(e) => warn!("Could not retrieve program for session {}: {}", session, e),
    }
}
