//! fxcal CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use fxcal_cli::cli::{Cli, Command, ConfigAction};
use fxcal_cli::commands;
use fxcal_cli::config::FxcalConfig;
use fxcal_cli::error::ClientResult;
use fxcal_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::for_cli(cli.debug, cli.json_logs)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(FxcalConfig::default_path);
    let config = match cli.config {
        Some(ref path) => FxcalConfig::load_from(path)?,
        None => FxcalConfig::load()?,
    };

    match cli.command {
        Command::Sync { dry_run } => commands::sync::run(&config, dry_run).await,
        Command::Watch { interval, dry_run } => {
            commands::watch::run(&config, Duration::from_secs(interval), dry_run).await
        }
        Command::Parse { file } => commands::parse::run(&config, file.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
