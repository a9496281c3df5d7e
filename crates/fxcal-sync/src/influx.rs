//! InfluxDB 1.x destination.
//!
//! Each record becomes one line-protocol point in the `fxevents`
//! measurement. Currency and title are tags and the timestamp is the point
//! time, so the natural key maps onto the point identity and writing the same
//! key again replaces the earlier point.

use std::time::Duration;

use fxcal_core::{BoxFuture, EventRecord};
use reqwest::{Client, StatusCode};
use tracing::trace;
use url::Url;

use crate::error::StoreError;
use crate::store::{EventSink, WriteAck};

/// Measurement holding calendar events.
pub const MEASUREMENT: &str = "fxevents";

/// Connection settings for the InfluxDB destination.
#[derive(Clone)]
pub struct InfluxConfig {
    pub host: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl InfluxConfig {
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            user: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.user = Some(user.into());
        self.password = password;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Writes records as points through the `/write` endpoint.
pub struct InfluxStore {
    client: Client,
    write_url: Url,
}

impl InfluxStore {
    pub fn new(config: &InfluxConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            write_url: write_url(config)?,
        })
    }
}

fn write_url(config: &InfluxConfig) -> Result<Url, StoreError> {
    let base = format!("{}/write", config.host.trim_end_matches('/'));
    let mut url = Url::parse(&base)
        .map_err(|e| StoreError::config(format!("invalid InfluxDB host {:?}: {}", config.host, e)))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("db", &config.database);
        if let Some(ref user) = config.user {
            query.append_pair("u", user);
        }
        if let Some(ref password) = config.password {
            query.append_pair("p", password);
        }
        query.append_pair("precision", "s");
    }
    Ok(url)
}

/// Renders a record as one line-protocol point.
pub fn line_protocol(record: &EventRecord) -> String {
    let mut line = format!(
        "{},currency={},title={} level=\"{}\",id=\"{}\"",
        MEASUREMENT,
        escape_tag(record.currency.code()),
        escape_tag(&record.title),
        record.level,
        escape_field(&record.id),
    );

    let optionals = [
        ("actual", &record.actual),
        ("forecast", &record.forecast),
        ("previous", &record.previous),
        ("explanation", &record.explanation),
    ];
    for (key, value) in optionals {
        if let Some(value) = value {
            line.push_str(&format!(",{}=\"{}\"", key, escape_field(value)));
        }
    }

    line.push_str(&format!(" {}", record.timestamp.timestamp()));
    line
}

/// Escapes a tag value: commas, equal signs and spaces are significant, and a
/// lone backslash would escape the separator after it.
fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ',' | '=' | ' ' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes a string field value.
fn escape_field(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl EventSink for InfluxStore {
    fn name(&self) -> &str {
        "influxdb"
    }

    fn upsert<'a>(&'a self, record: &'a EventRecord) -> BoxFuture<'a, Result<WriteAck, StoreError>> {
        Box::pin(async move {
            let point = line_protocol(record);
            trace!(point = %point, "Writing point");

            let response = self
                .client
                .post(self.write_url.clone())
                .body(point)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::NO_CONTENT || status == StatusCode::OK {
                return Ok(WriteAck::ok());
            }
            let body = response.text().await.unwrap_or_default();
            Ok(WriteAck::failed(format!("InfluxDB answered {}: {}", status.as_u16(), body.trim())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fxcal_core::{Currency, EventLevel};

    fn nfp() -> EventRecord {
        EventRecord::new(
            Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap(),
            Currency::Usd,
            EventLevel::High,
            "Non-Farm Payrolls",
        )
        .with_id("abc")
    }

    #[test]
    fn minimal_point() {
        assert_eq!(
            line_protocol(&nfp()),
            "fxevents,currency=USD,title=Non-Farm\\ Payrolls level=\"high\",id=\"abc\" 1704875400"
        );
    }

    #[test]
    fn optional_fields_in_order() {
        let record = nfp().with_actual("200K").with_previous("175K");
        let line = line_protocol(&record);
        assert!(line.contains(",actual=\"200K\",previous=\"175K\" "));
        assert!(!line.contains("forecast"));
        assert!(!line.contains("explanation"));
    }

    #[test]
    fn tag_escaping() {
        assert_eq!(escape_tag("a,b=c d"), "a\\,b\\=c\\ d");
        assert_eq!(escape_tag("plain"), "plain");
        assert_eq!(escape_tag(r"C:\dir"), r"C:\\dir");
    }

    #[test]
    fn trailing_backslash_in_title_keeps_tags_apart() {
        let record =
            EventRecord::new(nfp().timestamp, Currency::Usd, EventLevel::High, r"Payrolls\");
        let line = line_protocol(&record);
        assert!(line.starts_with(r"fxevents,currency=USD,title=Payrolls\\ level="));
    }

    #[test]
    fn field_escaping() {
        let record = nfp().with_explanation(r#"Said "hawkish" \ twice"#);
        let line = line_protocol(&record);
        assert!(line.contains(r#"explanation="Said \"hawkish\" \\ twice""#));
    }

    #[test]
    fn write_url_carries_database_and_credentials() {
        let config = InfluxConfig::new("http://influx.local:8086/", "fx")
            .with_credentials("writer", Some("pw".to_string()));
        let url = write_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "http://influx.local:8086/write?db=fx&u=writer&p=pw&precision=s"
        );
    }

    #[test]
    fn write_url_without_credentials() {
        let url = write_url(&InfluxConfig::new("http://influx.local:8086", "fx")).unwrap();
        assert_eq!(url.as_str(), "http://influx.local:8086/write?db=fx&precision=s");
    }

    #[test]
    fn debug_redacts_password() {
        let config = InfluxConfig::new("http://h", "fx").with_credentials("u", Some("pw".into()));
        assert!(!format!("{:?}", config).contains("\"pw\""));
    }
}
