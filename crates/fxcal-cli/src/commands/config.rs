//! Configuration commands.

use std::path::Path;

use crate::config::FxcalConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the configuration, secret references unresolved.
pub fn dump(config: &FxcalConfig, path: &Path) -> ClientResult<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Serialize(format!("failed to serialize config: {}", e)))?;
    println!("# {}", path.display());
    println!("{}", rendered);
    Ok(())
}

/// Validate the configuration, resolving every secret reference.
pub fn validate(config: &FxcalConfig) -> ClientResult<()> {
    config.validate()?;

    println!("Configuration is valid.");
    println!("  calendar: {}", config.calendar_url()?);
    if let Some(ref backend) = config.backend {
        println!("  backend: {}", backend.address);
    }
    match config.influxdb {
        Some(ref influx) => println!("  influxdb: {}/{}", influx.host, influx.name),
        None => println!("  influxdb: disabled"),
    }
    for extra in &config.sync.extra_backends {
        println!("  extra backend: {}", extra.address);
    }
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    let status = if path.exists() { "" } else { " (not found)" };
    println!("config: {}{}", path.display(), status);
    Ok(())
}
