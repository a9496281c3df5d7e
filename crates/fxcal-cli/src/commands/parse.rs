//! `fxcal parse`: print parsed events without touching any store.

use std::path::Path;

use fxcal_scraper::{HttpFetcher, ParsedPage, load_page, parse_events};
use tracing::info;

use crate::config::FxcalConfig;
use crate::error::{ClientError, ClientResult};

/// Parses the live page, or a saved copy, and prints the records as JSON.
pub async fn run(config: &FxcalConfig, file: Option<&Path>) -> ClientResult<()> {
    let source = match file {
        Some(path) => {
            info!(path = %path.display(), "Reading saved page");
            std::fs::read_to_string(path)?
        }
        None => {
            let fetcher = HttpFetcher::new(&config.fetch_config())?;
            load_page(&fetcher, &config.calendar_url()?).await?
        }
    };

    let page = parse_events(&source)?;
    println!("{}", render_events(&page)?);
    Ok(())
}

/// Renders the parsed records as a pretty JSON array.
pub fn render_events(page: &ParsedPage) -> ClientResult<String> {
    serde_json::to_string_pretty(&page.events).map_err(|e| ClientError::Serialize(e.to_string()))
}
