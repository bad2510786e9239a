// src/config.rs
//! Collector configuration
//!
//! Built once at startup from environment variables (a `.env` file and an
//! optional `config/default` file are honoured) and handed by value to the
//! server and the database sink.

use std::fmt;
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, Map};
use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogFormat;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Load(#[from] config::ConfigError),

    #[error("DB_PASSWORD must be set (it may be empty)")]
    MissingPassword,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Unknown LOG_FORMAT '{0}', expected 'json' or 'pretty'")]
    LogFormat(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// TCP listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Longest line accepted from the switch, in bytes
    pub max_line_length: usize,
    /// How long in-flight connections get to finish on shutdown
    pub shutdown_timeout: Duration,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub pool_size: usize,
    /// Create the CDR table at startup when it is missing
    pub init_schema: bool,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

/// Flat view of the environment, one field per variable.
#[derive(Debug, Deserialize)]
struct Settings {
    net_socket_addr: String,
    net_socket_port: u16,
    db_host: String,
    db_port: u16,
    db_name: String,
    db_user: String,
    db_password: Option<String>,
    db_pool_size: usize,
    db_init_schema: bool,
    log_level: String,
    log_format: String,
    max_line_length: usize,
    shutdown_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::default())
            .build()?
            .try_deserialize()?;

        Self::from_settings(settings)
    }

    /// Same as [`Config::from_env`] but reads variables from `vars` only.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(Environment::default().source(Some(vars)))
            .build()?
            .try_deserialize()?;

        Self::from_settings(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("net_socket_addr", "0.0.0.0")?
            .set_default("net_socket_port", 9000)?
            .set_default("db_host", "postgres")?
            .set_default("db_port", 5432)?
            .set_default("db_name", "itsupport")?
            .set_default("db_user", "avaya")?
            .set_default("db_pool_size", 10)?
            .set_default("db_init_schema", false)?
            .set_default("log_level", "info")?
            .set_default("log_format", "json")?
            .set_default("max_line_length", 8192)?
            .set_default("shutdown_timeout_secs", 10)
    }

    fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let password = settings.db_password.ok_or(ConfigError::MissingPassword)?;

        if settings.db_pool_size == 0 {
            return Err(ConfigError::Zero("DB_POOL_SIZE"));
        }
        if settings.max_line_length == 0 {
            return Err(ConfigError::Zero("MAX_LINE_LENGTH"));
        }

        let format = settings
            .log_format
            .parse()
            .map_err(|_| ConfigError::LogFormat(settings.log_format.clone()))?;

        Ok(Config {
            server: ServerConfig {
                host: settings.net_socket_addr,
                port: settings.net_socket_port,
                max_line_length: settings.max_line_length,
                shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
            },
            database: DatabaseConfig {
                host: settings.db_host,
                port: settings.db_port,
                name: settings.db_name,
                user: settings.db_user,
                password,
                pool_size: settings.db_pool_size,
                init_schema: settings.db_init_schema,
            },
            logging: LoggingConfig {
                level: settings.log_level,
                format,
            },
        })
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            max_line_length: 8192,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("pool_size", &self.pool_size)
            .field("init_schema", &self.init_schema)
            .finish()
    }
}
