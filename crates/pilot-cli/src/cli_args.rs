//! CLI argument parsing for pilot.

use clap::Parser;
use pilot_config::CliOverrides;

#[derive(Parser, Clone, Debug)]
#[command(name = "pilot")]
#[command(about = "Drive a browser through a task with a remote decision service")]
#[command(version)]
pub struct Cli {
    /// What to accomplish, in plain language
    #[arg(long)]
    pub task: String,

    /// Page to start from
    #[arg(long)]
    pub url: String,

    /// Override the configured model
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Maximum perceive-decide-act iterations (default: 15)
    #[arg(long = "max_iterations", alias = "max-iterations", value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Run Chrome without a visible window
    #[arg(long)]
    pub headless: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// On failure, save the program the service generated for the last session
    #[arg(long)]
    pub dump_program: bool,

    /// Where run directories are created (default: results)
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            model: self.model.clone(),
            max_iterations: self.max_iterations,
            headless: self.headless,
            results_dir: self.results_dir.clone(),
        }
    }
}
