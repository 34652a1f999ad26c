/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 3000)
/// - `APP_ENV` / `NODE_ENV`: `development` or `production` (default: development)
/// - `DATABASE_URL`: PostgreSQL connection string, or the split form
///   `DATABASE_HOST`, `DATABASE_PORT` (default 5432), `DATABASE_USER`,
///   `DATABASE_PASSWORD`, `DATABASE_NAME`
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `LOG_LEVEL`: `fatal|error|warn|info|debug|trace` (default: info); `RUST_LOG` wins if set
/// - `LOG_FORMAT`: `json` for JSON log lines
///
/// # Example
///
/// ```no_run
/// use lrnr_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;

use lrnr_shared::auth::AuthConfig;
use serde::{Deserialize, Serialize};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub environment: Environment,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" | "test" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("Unknown environment '{}': expected development or production", other),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// Loads `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No database location is configured
    /// - A variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("API_PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a port number, got '{}'", value))?,
            None => 3000,
        };

        let environment = match lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            Some(value) => Environment::parse(&value)?,
            None => Environment::Development,
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.parse::<u32>().map_err(|_| {
                anyhow::anyhow!("DATABASE_MAX_CONNECTIONS must be a positive integer, got '{}'", value)
            })?,
            None => 10,
        };

        let level = match lookup("LOG_LEVEL") {
            Some(value) => log_level_directive(&value)?,
            None => "info".to_string(),
        };
        let json = lookup("LOG_FORMAT").is_some_and(|format| format.eq_ignore_ascii_case("json"));

        Ok(Self {
            api: ApiConfig { host, port },
            database: DatabaseConfig {
                url: database_url(&lookup)?,
                max_connections,
            },
            logging: LoggingConfig { level, json },
            environment,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Authentication settings for this environment
    pub fn auth(&self) -> AuthConfig {
        AuthConfig::for_environment(self.is_production())
    }
}

fn database_url<F>(lookup: &F) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        return Ok(url);
    }

    let required = |key: &str| {
        lookup(key).ok_or_else(|| {
            anyhow::anyhow!("DATABASE_URL or {} environment variable is required", key)
        })
    };

    let host = required("DATABASE_HOST")?;
    let user = required("DATABASE_USER")?;
    let name = required("DATABASE_NAME")?;
    let password = lookup("DATABASE_PASSWORD").unwrap_or_default();
    let port = lookup("DATABASE_PORT").unwrap_or_else(|| "5432".to_string());

    if password.is_empty() {
        Ok(format!("postgresql://{}@{}:{}/{}", user, host, port, name))
    } else {
        Ok(format!("postgresql://{}:{}@{}:{}/{}", user, password, host, port, name))
    }
}

/// Maps a `LOG_LEVEL` value to an `EnvFilter` directive
fn log_level_directive(value: &str) -> anyhow::Result<String> {
    match value.to_ascii_lowercase().as_str() {
        "fatal" | "error" => Ok("error".to_string()),
        level @ ("warn" | "info" | "debug" | "trace") => Ok(level.to_string()),
        other => anyhow::bail!("Unknown LOG_LEVEL '{}'", other),
    }
}
