//! Configuration management for the Fire Department Administration Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with FDA prefix (e.g. FDA__JWT__SECRET)

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Refresh-token cookie settings
    pub cookie: CookieConfig,

    /// Attendance QR token settings
    pub qr: QrConfig,

    /// Frontend location, used to build password-reset links
    pub frontend: FrontendConfig,

    /// Log output settings
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,

    /// Password-reset token expiration in seconds
    pub reset_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CookieConfig {
    /// Mark the refresh cookie `Secure` (HTTPS only)
    pub secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QrConfig {
    /// HMAC key for attendance tokens
    pub secret: String,

    /// Lifetime of a QR token when the request does not specify one
    pub default_ttl_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FrontendConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// "pretty" or "json"
    pub format: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("FDA_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 5000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 900)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("jwt.reset_token_expiry", 3600)?
            .set_default("cookie.secure", environment == "production")?
            .set_default("qr.default_ttl_minutes", 15)?
            .set_default("frontend.url", "http://localhost:3000")?
            .set_default("log.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FDA_ prefix)
            .add_source(
                Environment::with_prefix("FDA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "0.0.0.0".to_string(),
        }
    }
}
