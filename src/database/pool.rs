// src/database/pool.rs
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::CollectorError;

pub type DbPool = Pool;

/// Build the connection pool and make sure the database answers.
pub async fn create_pool(database: &DatabaseConfig) -> Result<Pool, CollectorError> {
    let mut cfg = Config::new();
    cfg.host = Some(database.host.clone());
    cfg.port = Some(database.port);
    cfg.dbname = Some(database.name.clone());
    cfg.user = Some(database.user.clone());
    cfg.password = Some(database.password.clone());
    cfg.application_name = Some(env!("CARGO_PKG_NAME").to_string());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(database.pool_size));

    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

    // Test connection
    let client = pool.get().await?;
    let row = client.query_one("SELECT 1 as test", &[]).await?;
    let test: i32 = row.get(0);

    if test == 1 {
        info!(
            host = %database.host,
            port = database.port,
            database = %database.name,
            max_connections = database.pool_size,
            "Database connection test successful"
        );
    }

    Ok(pool)
}
