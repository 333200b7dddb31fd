//! Configuration for the MediaMTX exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Upstream URL used when MediaMTX sits behind credential probing.
pub const DEFAULT_PROBE_URL: &str = "http://mediamtx:9998/metrics";

/// Upstream URL used when authentication is handled externally.
pub const DEFAULT_EXTERNAL_URL: &str = "http://localhost:9998/metrics";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Upstream MediaMTX metrics endpoint.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// HTTP endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Refresh scheduling.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Sample filtering.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the exporter authenticates against MediaMTX.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Try each credential candidate in order until one is accepted.
    #[default]
    Probe,
    /// A single unauthenticated request; auth is cleared by an external backend.
    External,
}

impl std::str::FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "probe" => Ok(AuthMode::Probe),
            "external" => Ok(AuthMode::External),
            other => Err(ConfigError::Validation(format!(
                "Unknown auth mode: {} (expected \"probe\" or \"external\")",
                other
            ))),
        }
    }
}

/// HTTP Basic credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Upstream endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Authentication variant (default: "probe").
    #[serde(default)]
    pub auth: AuthMode,

    /// Metrics URL; defaults depend on `auth`.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-attempt timeout in milliseconds (default: 2000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts on 429/5xx responses (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between those attempts in milliseconds (default: 100).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Candidates tried in order in probe mode; `null` means no credentials.
    #[serde(default = "default_credentials")]
    pub credentials: Vec<Option<Credential>>,
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

/// No credentials first, then the usual MediaMTX guesses.
pub fn default_credentials() -> Vec<Option<Credential>> {
    vec![
        None,
        Some(Credential::new("admin", "admin")),
        Some(Credential::new("mediamtx", "mediamtx")),
        Some(Credential::new("root", "root")),
        Some(Credential::new("admin", "")),
        Some(Credential::new("", "")),
    ]
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            auth: AuthMode::default(),
            url: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            credentials: default_credentials(),
        }
    }
}

impl UpstreamConfig {
    /// The configured URL, or the default for the auth mode.
    pub fn url(&self) -> &str {
        match (&self.url, self.auth) {
            (Some(url), _) => url,
            (None, AuthMode::Probe) => DEFAULT_PROBE_URL,
            (None, AuthMode::External) => DEFAULT_EXTERNAL_URL,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Path for liveness endpoint (default: "/health").
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            health_path: default_health_path(),
        }
    }
}

/// Refresh scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between background refreshes (default: 10).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Seconds to wait after a refresh cycle aborted unexpectedly (default: 30).
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    /// Refresh synchronously on every scrape of the metrics path (default: true).
    #[serde(default = "default_on_scrape")]
    pub on_scrape: bool,
}

fn default_interval() -> u64 {
    10
}

fn default_error_backoff() -> u64 {
    30
}

fn default_on_scrape() -> bool {
    true
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            error_backoff_secs: default_error_backoff(),
            on_scrape: default_on_scrape(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Sample filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for metric names to include (empty = all).
    #[serde(default)]
    pub include_metrics: Vec<String>,

    /// Glob patterns for metric names to exclude.
    #[serde(default)]
    pub exclude_metrics: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let upstream = &self.upstream;

        if upstream.timeout_ms == 0 || upstream.timeout_ms >= 10_000 {
            return Err(ConfigError::Validation(
                "timeout_ms must be between 1 and 9999".to_string(),
            ));
        }

        let url = upstream.url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "Upstream url must be http:// or https://: {}",
                url
            )));
        }

        if upstream.auth == AuthMode::Probe && upstream.credentials.is_empty() {
            return Err(ConfigError::Validation(
                "Probe mode needs at least one credential candidate".to_string(),
            ));
        }

        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "interval_secs must be > 0".to_string(),
            ));
        }

        if self.refresh.error_backoff_secs == 0 {
            return Err(ConfigError::Validation(
                "error_backoff_secs must be > 0".to_string(),
            ));
        }

        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.server.listen
            )));
        }

        if !self.server.path.starts_with('/') || !self.server.health_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics and health paths must start with /".to_string(),
            ));
        }

        if self.server.path == self.server.health_path {
            return Err(ConfigError::Validation(
                "Metrics and health paths must differ".to_string(),
            ));
        }

        Ok(())
    }
}
