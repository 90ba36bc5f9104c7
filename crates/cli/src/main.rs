//! e2e-builder CLI - Main Entry Point
//!
//! Runs end-to-end test targets declared in a workspace file, starting the
//! dev server they depend on through the local host.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod output;

use commands::{run, targets};
use e2e_builder_common::DEFAULT_WORKSPACE_FILE;
use e2e_builder_host::LocalHost;

/// e2e-builder - end-to-end tests against a managed dev server
#[derive(Parser)]
#[command(name = "e2e-builder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace file
    #[arg(long, env = "E2E_BUILDER_WORKSPACE", default_value = DEFAULT_WORKSPACE_FILE, global = true)]
    workspace: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an e2e target
    Run(run::RunArgs),

    /// List workspace targets
    Targets,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let host = LocalHost::load(&cli.workspace).map_err(|e| {
        anyhow::anyhow!("Cannot load workspace {}: {}", cli.workspace.display(), e)
    })?;

    match cli.command {
        Commands::Run(args) => run::execute(args, &host, cli.format).await,
        Commands::Targets => {
            targets::execute(&host, cli.format);
            Ok(true)
        }
    }
}
