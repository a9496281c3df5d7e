//! Configuration file.
//!
//! All settings live in one `config.toml`, by default at
//! `~/.config/fxcal/config.toml`:
//!
//! ```toml
//! [source]
//! base_url = "https://www.dailyfx.com"
//! calendar_path = "/calendar"
//!
//! [backend]
//! address = "https://backend.example.com"
//! app_uri = "https://fxcal"
//! client_id = "fxcal"
//! app_key = "env::FXCAL_APP_KEY"
//!
//! [influxdb]
//! host = "http://localhost:8086"
//! name = "fx"
//! user = "writer"
//! password = "pass::fxcal/influx"
//!
//! [sync]
//! write_timeout_secs = 10
//! max_concurrent_writes = 1
//! extra_backends = [{ address = "https://qa.example.com", app_uri = "https://fxcal-qa" }]
//! ```
//!
//! Credentials (`client_id`, `app_key`, `user`, `password`) accept secret
//! references, see [`crate::secret`]. Backend and InfluxDB keys also accept
//! their camelCase names (`backendAddress`, `dbHost`, ...).

use std::path::{Path, PathBuf};
use std::time::Duration;

use fxcal_scraper::{FetchConfig, calendar_url};
use fxcal_sync::{BackendConfig, InfluxConfig, PipelineConfig};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Configuration for the `fxcal` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FxcalConfig {
    /// Calendar page settings.
    pub source: SourceSettings,

    /// Events backend; required to sync.
    pub backend: Option<BackendSettings>,

    /// InfluxDB destination; disabled when absent.
    pub influxdb: Option<InfluxSettings>,

    /// Write settings.
    pub sync: SyncSettings,
}

/// Where the calendar page is fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub base_url: String,
    pub calendar_path: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.dailyfx.com".to_string(),
            calendar_path: "/calendar".to_string(),
            timeout_secs: FetchConfig::DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

/// Events backend connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(alias = "backendAddress")]
    pub address: String,

    #[serde(alias = "backendAppUri")]
    pub app_uri: String,

    /// Supports `pass::` and `env::` references.
    #[serde(alias = "clientId")]
    pub client_id: String,

    /// Supports `pass::` and `env::` references.
    #[serde(alias = "appKey")]
    pub app_key: String,
}

/// InfluxDB 1.x connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfluxSettings {
    #[serde(alias = "dbHost")]
    pub host: String,

    #[serde(alias = "dbName")]
    pub name: String,

    #[serde(default, alias = "dbUser")]
    pub user: Option<String>,

    #[serde(default, alias = "dbPassword")]
    pub password: Option<String>,
}

/// Another environment of the backend, sharing the backend credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraBackend {
    /// Name used in logs; defaults to `backend-<n>`.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(alias = "backendAddress")]
    pub address: String,

    #[serde(alias = "backendAppUri")]
    pub app_uri: String,
}

/// How writes are issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub write_timeout_secs: u64,
    pub max_concurrent_writes: usize,
    pub extra_backends: Vec<ExtraBackend>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            write_timeout_secs: PipelineConfig::DEFAULT_WRITE_TIMEOUT_SECS,
            max_concurrent_writes: 1,
            extra_backends: Vec::new(),
        }
    }
}

impl FxcalConfig {
    /// Loads configuration from the default path, or defaults if it is absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration text.
    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fxcal")
            .join("config.toml")
    }

    /// Returns the calendar page URL.
    pub fn calendar_url(&self) -> ClientResult<Url> {
        Ok(calendar_url(&self.source.base_url, &self.source.calendar_path)?)
    }

    /// Returns the page fetcher settings.
    pub fn fetch_config(&self) -> FetchConfig {
        let config =
            FetchConfig::default().with_timeout(Duration::from_secs(self.source.timeout_secs));
        match self.source.user_agent {
            Some(ref agent) => config.with_user_agent(agent),
            None => config,
        }
    }

    /// Returns the pipeline settings.
    pub fn pipeline_config(&self, dry_run: bool) -> ClientResult<PipelineConfig> {
        if self.sync.write_timeout_secs == 0 {
            return Err(ClientError::config("sync.write_timeout_secs must be positive"));
        }
        if self.sync.max_concurrent_writes == 0 {
            return Err(ClientError::config("sync.max_concurrent_writes must be at least 1"));
        }
        Ok(PipelineConfig::new(self.calendar_url()?)
            .with_write_timeout(Duration::from_secs(self.sync.write_timeout_secs))
            .with_max_concurrent_writes(self.sync.max_concurrent_writes)
            .with_dry_run(dry_run))
    }

    fn backend_settings(&self) -> ClientResult<&BackendSettings> {
        self.backend.as_ref().ok_or_else(|| {
            ClientError::config(format!(
                "no [backend] section in {}; add:\n  \
                 [backend]\n  \
                 address = \"https://...\"\n  \
                 app_uri = \"...\"\n  \
                 client_id = \"...\"\n  \
                 app_key = \"env::FXCAL_APP_KEY\"",
                Self::default_path().display()
            ))
        })
    }

    /// Resolves the primary backend connection, expanding secret references.
    pub fn backend_config(&self) -> ClientResult<BackendConfig> {
        let backend = self.backend_settings()?;
        let client_id = secret::resolve(&backend.client_id)?;
        let app_key = secret::resolve(&backend.app_key)?;
        Ok(BackendConfig::new(
            &backend.address,
            &backend.app_uri,
            client_id,
            app_key,
        ))
    }

    /// Resolves the extra backends as `(name, config)` pairs.
    pub fn extra_backend_configs(&self) -> ClientResult<Vec<(String, BackendConfig)>> {
        if self.sync.extra_backends.is_empty() {
            return Ok(Vec::new());
        }
        let primary = self.backend_config()?;
        Ok(self
            .sync
            .extra_backends
            .iter()
            .enumerate()
            .map(|(i, extra)| {
                let name = extra
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("backend-{}", i + 1));
                let config = BackendConfig {
                    address: extra.address.clone(),
                    app_uri: extra.app_uri.clone(),
                    ..primary.clone()
                };
                (name, config)
            })
            .collect())
    }

    /// Resolves the InfluxDB connection, if configured.
    pub fn influx_config(&self) -> ClientResult<Option<InfluxConfig>> {
        let Some(ref influx) = self.influxdb else {
            return Ok(None);
        };
        let mut config = InfluxConfig::new(&influx.host, &influx.name);
        if influx.user.is_none() && influx.password.is_some() {
            return Err(ClientError::config("influxdb.password is set without influxdb.user"));
        }
        if let Some(ref user) = influx.user {
            let password = influx.password.as_deref().map(secret::resolve).transpose()?;
            config = config.with_credentials(secret::resolve(user)?, password);
        }
        Ok(Some(config))
    }

    /// Checks everything a sync run needs, resolving secrets on the way.
    pub fn validate(&self) -> ClientResult<()> {
        self.pipeline_config(false)?;

        let backend = self.backend_config()?;
        fxcal_sync::events_endpoint(&backend.address)?;
        for (name, extra) in self.extra_backend_configs()? {
            fxcal_sync::events_endpoint(&extra.address).map_err(|e| {
                ClientError::config(format!("extra backend {}: {}", name, e))
            })?;
        }
        if let Some(influx) = self.influx_config()? {
            Url::parse(&influx.host).map_err(|e| {
                ClientError::config(format!("invalid InfluxDB host {:?}: {}", influx.host, e))
            })?;
        }
        Ok(())
    }
}
