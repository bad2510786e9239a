// src/main.rs
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use avaya_cdr_collector::collector::{shutdown_signal, CdrServer};
use avaya_cdr_collector::database::{create_pool, ensure_schema, PgCdrSink};
use avaya_cdr_collector::logging::init_tracing;
use avaya_cdr_collector::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Avaya CDR collector");

    // Create database pool
    let db_pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    info!("Database pool created");

    if config.database.init_schema {
        ensure_schema(&db_pool)
            .await
            .context("Failed to create CDR table")?;
    }

    let sink = Arc::new(PgCdrSink::new(db_pool));
    let server = CdrServer::bind(&config.server, sink).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down");
        signal_token.cancel();
    });

    server.run(shutdown).await;

    Ok(())
}
