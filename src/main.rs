// Copyright 2026 Jobpilot Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use jobpilot::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "jobpilot",
    about = "Jobpilot — rate-limited job application automation",
    version,
    after_help = "Run 'jobpilot <command> --help' for details on each command."
)]
struct Cli {
    /// Path to the config file (default: ~/.jobpilot/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one application run in the foreground
    Run,
    /// Show daily progress and scheduler state
    Status,
    /// Pause scheduling for a number of minutes
    Pause {
        /// How long to pause
        #[arg(long, default_value = "60")]
        minutes: i64,
    },
    /// Clear a scheduling pause
    Resume,
    /// Check environment and diagnose issues
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "jobpilot=debug"
    } else {
        "jobpilot=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run => cli::run_cmd::run(config, cli.json).await,
        Commands::Status => cli::status_cmd::run(config, cli.json).await,
        Commands::Pause { minutes } => cli::pause_cmd::run(config, minutes).await,
        Commands::Resume => cli::resume_cmd::run(config).await,
        Commands::Doctor => cli::doctor::run(config).await,
    };

    // Consistent exit codes: 0=success (including no-jobs and limit-reached
    // runs), 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    result
}
