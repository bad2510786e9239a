// src/error.rs
use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Failure to persist a single record. Never fatal: the connection logs it
/// and moves on to the next line.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Duration of {0}s does not fit the duration column")]
    DurationOutOfRange(u32),
}

/// Errors that stop the collector before it serves traffic.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create database pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("Database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl StoreError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Pool(_) => "pool_error",
            StoreError::Database(_) => "database_error",
            StoreError::DurationOutOfRange(_) => "duration_out_of_range",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_codes() {
        assert_eq!(
            StoreError::DurationOutOfRange(u32::MAX).error_code(),
            "duration_out_of_range"
        );
    }

    #[test]
    fn test_bind_error_names_address() {
        let err = CollectorError::Bind {
            address: "0.0.0.0:9000".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };

        assert_eq!(
            err.to_string(),
            "Failed to bind 0.0.0.0:9000: address in use"
        );
    }
}
