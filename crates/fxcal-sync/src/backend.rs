//! HTTP client for the events backend.
//!
//! The backend exposes one resource, `/api/fxevents`:
//!
//! - `GET ?start=&end=` returns the JSON array of records in the window
//! - `POST` with a record body upserts it and answers `{success, message}`
//!
//! Every request carries basic auth (`client_id:app_key`) and the
//! `X-Backend-App-Uri` header identifying the calling application.

use std::time::Duration;

use fxcal_core::{BoxFuture, EventRecord, TimeRange};
use reqwest::{Client, Response};
use tracing::{debug, trace};
use url::Url;

use crate::error::StoreError;
use crate::store::{EventSink, EventStore, WriteAck};

/// Header carrying the calling application URI.
pub const APP_URI_HEADER: &str = "X-Backend-App-Uri";

const EVENTS_PATH: &str = "api/fxevents";

/// Connection settings for one backend environment.
#[derive(Clone)]
pub struct BackendConfig {
    pub address: String,
    pub app_uri: String,
    pub client_id: String,
    pub app_key: String,
    pub timeout: Duration,
}

impl BackendConfig {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(
        address: impl Into<String>,
        app_uri: impl Into<String>,
        client_id: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            app_uri: app_uri.into(),
            client_id: client_id.into(),
            app_key: app_key.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("address", &self.address)
            .field("app_uri", &self.app_uri)
            .field("client_id", &self.client_id)
            .field("app_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Backend client; both the reference store and a write destination.
pub struct BackendStore {
    name: String,
    client: Client,
    endpoint: Url,
    config: BackendConfig,
}

impl BackendStore {
    /// Creates a client for the given backend.
    pub fn new(config: BackendConfig) -> Result<Self, StoreError> {
        let endpoint = events_endpoint(&config.address)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: "backend".to_string(),
            client,
            endpoint,
            config,
        })
    }

    /// Sets the name used in logs and tallies.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The resource URL requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn range_url(&self, range: &TimeRange) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("start", &range.start.to_rfc3339())
            .append_pair("end", &range.end.to_rfc3339());
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .basic_auth(&self.config.client_id, Some(&self.config.app_key))
            .header(APP_URI_HEADER, &self.config.app_uri)
    }
}

/// Reads the body of a response, failing on non-success statuses.
async fn success_body(response: Response) -> Result<String, StoreError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Builds `<address>/api/fxevents`, keeping any path prefix of `address`.
pub fn events_endpoint(address: &str) -> Result<Url, StoreError> {
    let full = format!("{}/{}", address.trim_end_matches('/'), EVENTS_PATH);
    Url::parse(&full)
        .map_err(|e| StoreError::config(format!("invalid backend address {:?}: {}", address, e)))
}

impl EventStore for BackendStore {
    fn get_in_range<'a>(
        &'a self,
        range: &'a TimeRange,
    ) -> BoxFuture<'a, Result<Vec<EventRecord>, StoreError>> {
        Box::pin(async move {
            let url = self.range_url(range);
            trace!(url = %url, "Querying existing events");

            let response = self.authorize(self.client.get(url)).send().await?;
            let body = success_body(response).await?;
            let records: Vec<EventRecord> = serde_json::from_str(&body)?;

            debug!(
                store = %self.name,
                count = records.len(),
                "Retrieved existing events"
            );
            Ok(records)
        })
    }
}

impl EventSink for BackendStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert<'a>(&'a self, record: &'a EventRecord) -> BoxFuture<'a, Result<WriteAck, StoreError>> {
        Box::pin(async move {
            let request = self.client.post(self.endpoint.clone()).json(record);
            let response = self.authorize(request).send().await?;
            let body = success_body(response).await?;
            Ok(serde_json::from_str(&body)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn store() -> BackendStore {
        let config = BackendConfig::new("https://backend.example.com/", "https://app", "id", "key");
        BackendStore::new(config).unwrap()
    }

    #[test]
    fn endpoint_appends_resource() {
        let url = events_endpoint("https://backend.example.com").unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/api/fxevents");
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        let url = events_endpoint("https://host.example.com/qa/").unwrap();
        assert_eq!(url.as_str(), "https://host.example.com/qa/api/fxevents");
    }

    #[test]
    fn endpoint_rejects_bad_address() {
        assert!(matches!(
            events_endpoint("backend"),
            Err(StoreError::Config { .. })
        ));
    }

    #[test]
    fn range_url_carries_rfc3339_bounds() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let url = store().range_url(&range);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("start".to_string(), "2024-01-10T08:30:00+00:00".to_string()),
                ("end".to_string(), "2024-01-12T00:00:00+00:00".to_string()),
            ]
        );
    }

    #[test]
    fn name_is_configurable() {
        let store = store().with_name("backend-qa");
        assert_eq!(EventSink::name(&store), "backend-qa");
    }

    #[test]
    fn debug_redacts_key() {
        let config = BackendConfig::new("https://b", "https://app", "id", "s3cret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
