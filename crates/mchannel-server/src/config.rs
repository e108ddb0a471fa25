//! Server configuration loading from file and environment variables.

use mchannel_identity::ContactRule;
use mchannel_types::ModeratorAllowList;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Moderator allow-list.
    #[serde(default)]
    pub access: AccessConfig,

    /// Participant identity rules.
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mchannel_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Who counts as a moderator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Display names of moderators (exact match).
    #[serde(default)]
    pub moderators: Vec<String>,
}

/// Contact-key format.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Exact number of digits in a contact key.
    #[serde(default = "default_contact_digits")]
    pub contact_digits: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "mchannel.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    mchannel_db::DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    mchannel_db::DbRuntimeSettings::default().pool_max_size
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_contact_digits() -> usize {
    ContactRule::default().digits()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            contact_digits: default_contact_digits(),
        }
    }
}

impl DatabaseConfig {
    /// Pool tunables derived from this section.
    pub fn runtime_settings(&self) -> mchannel_db::DbRuntimeSettings {
        mchannel_db::DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

impl AccessConfig {
    /// Builds the moderator allow-list.
    pub fn allow_list(&self) -> ModeratorAllowList {
        ModeratorAllowList::new(&self.moderators)
    }
}

impl IdentityConfig {
    /// Builds the contact-key rule.
    pub fn contact_rule(&self) -> ContactRule {
        ContactRule::new(self.contact_digits)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `MCHANNEL_HOST` overrides `server.host`
/// - `MCHANNEL_PORT` overrides `server.port`
/// - `MCHANNEL_DB_PATH` overrides `database.path`
/// - `MCHANNEL_LOG_LEVEL` overrides `logging.level`
/// - `MCHANNEL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `MCHANNEL_MODERATORS` overrides `access.moderators` (comma-separated)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if `database.pool_max_size` or `identity.contact_digits` is zero.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    if config.database.pool_max_size == 0 {
        return Err(ConfigError::Invalid(
            "database.pool_max_size must be at least 1".to_string(),
        ));
    }

    if config.identity.contact_digits == 0 {
        return Err(ConfigError::Invalid(
            "identity.contact_digits must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("MCHANNEL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("MCHANNEL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("MCHANNEL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("MCHANNEL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("MCHANNEL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(moderators) = var("MCHANNEL_MODERATORS") {
        config.access.moderators = moderators.split(',').map(str::to_string).collect();
    }
}
