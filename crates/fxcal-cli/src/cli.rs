//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fxcal_sync::TriggerConfig;

/// fxcal - economic calendar scraper and store reconciler
#[derive(Debug, Parser)]
#[command(name = "fxcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "FXCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape the calendar once and update the stores
    Sync {
        /// Reconcile and report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Sync now, then again on every interval until interrupted
    Watch {
        /// Seconds between two runs
        #[arg(
            long,
            default_value_t = TriggerConfig::DEFAULT_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: u64,

        /// Reconcile and report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse the calendar and print the events as JSON
    Parse {
        /// Read a saved page instead of fetching it
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration, resolving secrets
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_dry_run() {
        let cli = Cli::try_parse_from(["fxcal", "sync", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::Sync { dry_run: true }));
    }

    #[test]
    fn watch_default_interval() {
        let cli = Cli::try_parse_from(["fxcal", "watch"]).unwrap();
        match cli.command {
            Command::Watch { interval, dry_run } => {
                assert_eq!(interval, 3600);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn watch_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["fxcal", "watch", "--interval", "0"]).is_err());
        let cli = Cli::try_parse_from(["fxcal", "watch", "--interval", "1"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { interval: 1, .. }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["fxcal", "parse", "--file", "page.html", "--debug"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Command::Parse { file } => assert_eq!(file, Some(PathBuf::from("page.html"))),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["fxcal"]).is_err());
    }
}
