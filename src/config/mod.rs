//! Configuration management for auth-gate
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::{self, RateLimitConfig};

/// Upper bound on the token validity window (one year)
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix AUTH_GATE_
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        // Server config from env
        if let Some(host) = lookup("AUTH_GATE_SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("AUTH_GATE_SERVER_PORT") {
            config.server.port = parse_value("AUTH_GATE_SERVER_PORT", &port)?;
        }

        // Database config from env
        if let Some(path) = lookup("AUTH_GATE_DATABASE_PATH") {
            config.database.path = path;
        }

        // Auth config from env
        if let Some(secret) = lookup("AUTH_GATE_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Some(issuer) = lookup("AUTH_GATE_ISSUER") {
            config.auth.issuer = issuer;
        }
        if let Some(ttl) = lookup("AUTH_GATE_TOKEN_TTL_SECS") {
            config.auth.token_ttl_secs = parse_value("AUTH_GATE_TOKEN_TTL_SECS", &ttl)?;
        }
        if let Some(burst) = lookup("AUTH_GATE_RATE_LIMIT_BURST") {
            config.auth.rate_limit.burst = parse_value("AUTH_GATE_RATE_LIMIT_BURST", &burst)?;
        }
        if let Some(interval) = lookup("AUTH_GATE_RATE_LIMIT_REFILL_INTERVAL_SECS") {
            config.auth.rate_limit.refill_interval_secs =
                parse_value("AUTH_GATE_RATE_LIMIT_REFILL_INTERVAL_SECS", &interval)?;
        }
        if let (Some(email), Some(password)) = (
            lookup("AUTH_GATE_BOOTSTRAP_ADMIN_EMAIL"),
            lookup("AUTH_GATE_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            config.auth.bootstrap_admin = Some(BootstrapAdminConfig { email, password });
        }

        // Logging config from env
        if let Some(level) = lookup("AUTH_GATE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("AUTH_GATE_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check values that would make the service unsafe or unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.token_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token_ttl_secs must be at most {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.auth.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.store_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.auth.revocation_prune_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.revocation_prune_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.auth.rate_limit.burst == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.burst must be greater than 0".to_string(),
            ));
        }
        if self.auth.rate_limit.refill_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.refill_interval_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(admin) = &self.auth.bootstrap_admin {
            if admin.email.is_empty() || admin.password.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "auth.bootstrap_admin requires email and password".to_string(),
                ));
            }
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidValue(format!(
                "logging.format must be json or pretty, got {}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Parse(format!("Invalid value for {}", key)))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    50051
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Issuer label stamped into tokens
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Token validity window in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Deadline for each store call in milliseconds
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Login rate limit
    #[serde(default)]
    pub rate_limit: AuthRateLimitConfig,

    /// Interval between revocation pruning runs in seconds
    #[serde(default = "default_prune_interval")]
    pub revocation_prune_interval_secs: u64,

    /// Admin identity created at startup if missing
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

impl AuthConfig {
    /// Token validity window
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Revocation pruning interval
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.revocation_prune_interval_secs)
    }

    /// Settings for the auth manager
    pub fn manager_config(&self) -> auth::AuthConfig {
        auth::AuthConfig {
            rate_limit: self.rate_limit.to_rate_limit_config(),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_issuer(),
            token_ttl_secs: default_token_ttl(),
            store_timeout_ms: default_store_timeout(),
            rate_limit: AuthRateLimitConfig::default(),
            revocation_prune_interval_secs: default_prune_interval(),
            bootstrap_admin: None,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("rate_limit", &self.rate_limit)
            .field(
                "revocation_prune_interval_secs",
                &self.revocation_prune_interval_secs,
            )
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

fn default_issuer() -> String {
    auth::DEFAULT_ISSUER.to_string()
}

fn default_token_ttl() -> u64 {
    auth::DEFAULT_TOKEN_TTL.as_secs()
}

fn default_store_timeout() -> u64 {
    5000
}

fn default_prune_interval() -> u64 {
    3600
}

/// Rate limiting configuration for login attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthRateLimitConfig {
    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Seconds to refill one attempt
    #[serde(default = "default_refill_interval")]
    pub refill_interval_secs: u64,
}

impl AuthRateLimitConfig {
    /// Convert to the limiter's runtime configuration
    pub fn to_rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            burst: self.burst,
            refill_interval: Duration::from_secs(self.refill_interval_secs),
        }
    }
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            refill_interval_secs: default_refill_interval(),
        }
    }
}

fn default_burst() -> u32 {
    5
}

fn default_refill_interval() -> u64 {
    12
}

/// Admin identity created on startup
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdminConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/auth-gate.db".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in the format ${VAR_NAME}
///
/// Unset variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
