//! fxcal command-line interface.
//!
//! Loads `config.toml`, wires the scraper and the stores into a
//! [`fxcal_sync::SyncPipeline`] and runs it once (`sync`), periodically
//! (`watch`) or stops after parsing (`parse`).

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use config::FxcalConfig;
pub use error::{ClientError, ClientResult};
