//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Cron trigger configuration.
    pub cron: CronConfig,
    /// Web Push configuration.
    pub push: PushConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Configuration for the periodic ping trigger.
///
/// The secret gates the HTTP trigger endpoint. When
/// `internal_interval_secs` is set the server also runs the ping pass on
/// its own tokio timer, for deployments without an external cron.
#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    /// Shared secret required by the trigger endpoint. Missing value fails
    /// configuration loading at startup.
    pub secret: String,
    /// Optional in-process trigger interval in seconds.
    #[serde(default)]
    pub internal_interval_secs: Option<u64>,
}

/// VAPID key material for Web Push delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// VAPID public key (base64 URL-safe encoded).
    pub vapid_public_key: String,
    /// VAPID private key (base64 URL-safe encoded).
    pub vapid_private_key: String,
    /// VAPID subject (mailto: or https: URL).
    #[serde(default = "default_push_subject")]
    pub subject: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_push_subject() -> String {
    "mailto:notifications@vibecheck.example".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `VIBECHECK_ENV`)
    /// 3. Environment variables with `VIBECHECK_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("VIBECHECK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("VIBECHECK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("VIBECHECK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
