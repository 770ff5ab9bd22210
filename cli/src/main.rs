//! `bep` - replay a build event JSON file and print what needs attention.
//!
//! Exit status is 0 when the build succeeded, 1 when it failed or the
//! stream ended before the build finished.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bep_cli::{RenderOptions, build_outcome, render, replay};
use bep_config::BepConfig;
use bep_engine::{BuildEventSession, FileUriResolver};

#[derive(Debug, Parser)]
#[command(name = "bep", version, about)]
struct Cli {
    /// Newline-delimited JSON build event file (`--build_event_json_file`).
    events: PathBuf,
    /// Workspace whose `.bep/config.toml` is layered over the user config.
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Use this config file instead of the user and workspace ones.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Expand every item with children, not only failures.
    #[arg(long)]
    all: bool,
    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(log_file: Option<&PathBuf>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();
        tracing::info!(path = %path.display(), "Logging initialized");
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<BepConfig> {
    match &cli.config {
        Some(path) => BepConfig::load_from(path)?
            .with_context(|| format!("config file {} does not exist", path.display())),
        None => Ok(BepConfig::load(cli.workspace.as_deref())?),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_ref())?;

    let config = load_config(&cli)?;
    let options = config.session_options()?;
    let mut session = BuildEventSession::new(config.matcher_registry(), FileUriResolver, options);

    replay(&mut session, &cli.events).await?;
    let output = render(
        &mut session,
        RenderOptions {
            expand_all: cli.all,
        },
    )
    .await;

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;

    match build_outcome(&session) {
        Some(true) => Ok(ExitCode::SUCCESS),
        Some(false) => Ok(ExitCode::FAILURE),
        None => {
            tracing::warn!("Event stream ended before the build finished");
            Ok(ExitCode::FAILURE)
        }
    }
}
