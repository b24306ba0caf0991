use crate::signals::RepeatSignalPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default location of the optional TOML configuration file
pub const DEFAULT_CONFIG_PATH: &str = "async-processor.toml";

const NATS_SCHEMES: &[&str] = &["nats", "tls", "ws", "wss"];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Message broker endpoint (required)
    #[serde(default)]
    pub nats_url: String,

    /// Address the HTTP endpoint binds to
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Port the HTTP endpoint listens on
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Log level name, case-insensitive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Document store connection string, unused by the supervisor itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongo_uri: Option<String>,

    /// Version reported in the startup banner
    #[serde(default = "default_service_version")]
    pub service_version: String,

    /// Upper bound for the whole shutdown sequence
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// What a second termination request does
    #[serde(default)]
    pub repeat_signal: RepeatSignalPolicy,

    /// Interval between subscriber heartbeats
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl ProcessorConfig {
    /// Load configuration from the default file location and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path, overridden by the process environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, Environment::default())
    }

    /// Load configuration from a file path and an explicit environment source.
    ///
    /// Precedence, lowest first: built-in defaults, the TOML file (optional),
    /// then unprefixed environment variables such as `NATS_URL` or `HTTP_PORT`.
    /// Environment values stay strings until deserialisation, so a value such
    /// as `SERVICE_VERSION=1.10` is kept verbatim.
    pub fn load_with_environment<P: AsRef<Path>>(
        path: P,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("nats_url", "")?
            .set_default("http_host", default_http_host())?
            .set_default("http_port", default_http_port())?
            .set_default("log_level", default_log_level())?
            .set_default("service_version", default_service_version())?
            .set_default(
                "shutdown_timeout_secs",
                default_shutdown_timeout_secs() as i64,
            )?
            .set_default("repeat_signal", "escalate")?
            .set_default(
                "heartbeat_interval_secs",
                default_heartbeat_interval_secs() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(environment)
            .build()?;

        let config: ProcessorConfig = settings.try_deserialize()?;
        config.validate()?;

        debug!("Final configuration: {:#?}", config);
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nats_url = self.nats_url.trim();
        if nats_url.is_empty() {
            return Err(ConfigError::Message("NATS_URL is required".to_string()));
        }

        let parsed = Url::parse(nats_url).map_err(|e| {
            ConfigError::Message(format!("invalid NATS_URL '{}': {}", nats_url, e))
        })?;
        if !NATS_SCHEMES.contains(&parsed.scheme()) {
            return Err(ConfigError::Message(format!(
                "invalid NATS_URL '{}': unsupported scheme '{}'",
                nats_url,
                parsed.scheme()
            )));
        }

        if self.http_host.trim().is_empty() {
            return Err(ConfigError::Message(
                "HTTP_HOST must not be empty".to_string(),
            ));
        }

        if self.http_port == 0 {
            return Err(ConfigError::Message(
                "HTTP_PORT must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "SHUTDOWN_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Message(
                "HEARTBEAT_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Socket address string for the HTTP endpoint
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            nats_url: String::new(),
            http_host: default_http_host(),
            http_port: default_http_port(),
            log_level: default_log_level(),
            mongo_uri: None,
            service_version: default_service_version(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            repeat_signal: RepeatSignalPolicy::default(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

// Default value functions
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_service_version() -> String {
    "dev".to_string()
}
fn default_shutdown_timeout_secs() -> u64 {
    30
}
fn default_heartbeat_interval_secs() -> u64 {
    30
}
