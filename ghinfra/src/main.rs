//! ghinfra - Google Cloud access planning for declaratively managed GitHub
//! repositories.
//!
//! Loads the operator configuration and repository descriptors, resolves
//! which projects each repository may act on, and plans the CI identities
//! that give GitHub Actions access to them.

#![forbid(unsafe_code)]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{Suffixes, Workspace};
use ghinfra_common::google::{PlanError, SuffixStateError};
use ghinfra_common::{ErrorCode, LoadError, LogConfig, SinkError, init_logging};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ghinfra")]
#[command(author, version, about = "Plan Google Cloud access for GitHub repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Operator configuration file
    #[arg(long, global = true, env = "GHINFRA_CONFIG", default_value = "ghinfra.toml")]
    config: PathBuf,

    /// Directory of repository descriptor YAML files
    #[arg(
        long,
        global = true,
        env = "GHINFRA_REPOSITORIES_DIR",
        default_value = "assets/repositories"
    )]
    repositories: PathBuf,

    /// Suffix state file; without it suffixes are derived from a hash
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every repository against the allowed projects
    ///
    /// Exits with status 1 when any repository is rejected.
    Validate,

    /// Print resolved per-project access
    Resolve,

    /// Print the project → repositories index
    Index,

    /// Print the provisioning plan as JSON
    Plan,

    /// Apply the plan to a recording sink and print the actions
    DryRun,

    /// Print the run report
    Report,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("warn");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => guards,
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            return ExitCode::from(2);
        }
    };

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(error) => {
            report_error(&error);
            ExitCode::from(2)
        }
    }
}

/// Returns `false` when the command succeeded but found rejected repositories.
async fn run(cli: Cli) -> Result<bool> {
    let workspace = Workspace::load(&cli.config, &cli.repositories, cli.json)?;
    let mut suffixes = Suffixes::open(cli.state.as_deref())?;

    match cli.command {
        Commands::Validate => return commands::validate(&workspace),
        Commands::Resolve => commands::resolve_access(&workspace)?,
        Commands::Index => commands::index(&workspace)?,
        Commands::Plan => commands::plan(&workspace, &mut suffixes)?,
        Commands::DryRun => commands::dry_run(&workspace, &mut suffixes).await?,
        Commands::Report => commands::report(&workspace, &mut suffixes)?,
    }
    Ok(true)
}

fn error_code(error: &anyhow::Error) -> Option<ErrorCode> {
    if let Some(error) = error.downcast_ref::<LoadError>() {
        return Some(error.error_code());
    }
    if let Some(error) = error.downcast_ref::<PlanError>() {
        return Some(error.error_code());
    }
    if let Some(error) = error.downcast_ref::<SinkError>() {
        return Some(error.error_code());
    }
    error
        .downcast_ref::<SuffixStateError>()
        .map(SuffixStateError::error_code)
}

fn report_error(error: &anyhow::Error) {
    eprintln!("{} {error:#}", "error:".red().bold());
    if let Some(code) = error_code(error) {
        eprintln!("{}", code.entry().format_full());
    }
}
