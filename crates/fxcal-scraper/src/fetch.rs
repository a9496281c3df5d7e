//! Fetching the calendar page.
//!
//! [`PageFetcher`] is the transport seam: it returns whatever the server
//! answered. [`load_page`] applies the acceptance rule on top of it (status
//! 200 and a non-empty body), so test doubles only need to hand back a status
//! and a body.

use std::time::Duration;

use fxcal_core::BoxFuture;
use reqwest::Client;
use tracing::{debug, info, trace};
use url::Url;

use crate::error::{ScrapeError, ScrapeResult};

/// What the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    /// Creates a page with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Retrieves raw page text over some transport.
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`ScrapeError`] only for transport failures. Any HTTP answer,
    /// including error statuses, is returned as a [`FetchedPage`].
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, ScrapeResult<FetchedPage>>;
}

/// Fetches `url` and returns its body if the answer is usable.
///
/// # Errors
///
/// Fails on transport errors, on any status other than 200 and on an empty
/// or whitespace-only body.
pub async fn load_page(fetcher: &dyn PageFetcher, url: &Url) -> ScrapeResult<String> {
    info!(url = %url, "Loading calendar page");

    let page = fetcher.fetch(url).await?;
    if page.status != 200 {
        return Err(ScrapeError::http_status(page.status));
    }
    if page.body.trim().is_empty() {
        return Err(ScrapeError::empty_body());
    }

    info!(bytes = page.body.len(), "Successfully loaded the page");
    Ok(page.body)
}

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl FetchConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("fxcal/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`PageFetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the given settings.
    pub fn new(config: &FetchConfig) -> ScrapeResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ScrapeError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, ScrapeResult<FetchedPage>> {
        Box::pin(async move {
            trace!(url = %url, "Sending request");
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| ScrapeError::network(format!("request failed: {}", e)).with_source(e))?;

            let status = response.status().as_u16();
            debug!(status, "Received response");

            let body = response.text().await.map_err(|e| {
                ScrapeError::network(format!("failed to read response: {}", e)).with_source(e)
            })?;
            Ok(FetchedPage { status, body })
        })
    }
}

/// Joins the site base URL and the calendar path.
pub fn calendar_url(base: &str, path: &str) -> ScrapeResult<Url> {
    let base = Url::parse(base).map_err(|e| {
        ScrapeError::configuration(format!("invalid base URL {:?}: {}", base, e)).with_source(e)
    })?;
    base.join(path).map_err(|e| {
        ScrapeError::configuration(format!("invalid calendar path {:?}: {}", path, e))
            .with_source(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeErrorCode;

    struct StaticFetcher(ScrapeResult<FetchedPage>);

    impl PageFetcher for StaticFetcher {
        fn fetch<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, ScrapeResult<FetchedPage>> {
            let result = match &self.0 {
                Ok(page) => Ok(page.clone()),
                Err(e) => Err(ScrapeError::new(e.code(), e.message())),
            };
            Box::pin(async move { result })
        }
    }

    fn url() -> Url {
        Url::parse("https://www.dailyfx.com/calendar").unwrap()
    }

    #[tokio::test]
    async fn load_page_returns_body_on_200() {
        let fetcher = StaticFetcher(Ok(FetchedPage::new(200, "<html></html>")));
        let body = load_page(&fetcher, &url()).await.unwrap();
        assert_eq!(body, "<html></html>");
    }

    #[tokio::test]
    async fn load_page_rejects_other_statuses() {
        let fetcher = StaticFetcher(Ok(FetchedPage::new(503, "maintenance")));
        let err = load_page(&fetcher, &url()).await.unwrap_err();
        assert_eq!(err.code(), ScrapeErrorCode::HttpStatus);
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn load_page_rejects_empty_body() {
        let fetcher = StaticFetcher(Ok(FetchedPage::new(200, "  \n")));
        let err = load_page(&fetcher, &url()).await.unwrap_err();
        assert_eq!(err.code(), ScrapeErrorCode::EmptyBody);
    }

    #[tokio::test]
    async fn load_page_propagates_transport_errors() {
        let fetcher = StaticFetcher(Err(ScrapeError::network("connection refused")));
        let err = load_page(&fetcher, &url()).await.unwrap_err();
        assert_eq!(err.code(), ScrapeErrorCode::NetworkError);
    }

    #[test]
    fn calendar_url_joins_path() {
        let url = calendar_url("https://www.dailyfx.com", "/calendar").unwrap();
        assert_eq!(url.as_str(), "https://www.dailyfx.com/calendar");
    }

    #[test]
    fn calendar_url_rejects_bad_base() {
        let err = calendar_url("not a url", "/calendar").unwrap_err();
        assert_eq!(err.code(), ScrapeErrorCode::ConfigurationError);
    }

    #[test]
    fn http_fetcher_builds() {
        let config = FetchConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("fxcal-test");
        assert!(HttpFetcher::new(&config).is_ok());
    }
}
