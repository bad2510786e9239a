// src/database/cdr_sink.rs
use async_trait::async_trait;
use tracing::debug;

use super::DbPool;
use crate::error::StoreError;
use crate::models::ParsedCdr;
use crate::traits::CdrSink;

const INSERT_CDR: &str = "INSERT INTO avaya_cdr
     (date, duration, calling_number, called_number, call_code)
     VALUES ($1, $2, $3, $4, $5)
     RETURNING id";

/// Writes each record to `avaya_cdr` as its own autocommitted insert.
pub struct PgCdrSink {
    db_pool: DbPool,
}

impl PgCdrSink {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CdrSink for PgCdrSink {
    async fn store(&self, record: &ParsedCdr) -> Result<(), StoreError> {
        let duration = i32::try_from(record.duration_seconds)
            .map_err(|_| StoreError::DurationOutOfRange(record.duration_seconds))?;

        // `date` is TIMESTAMP WITHOUT TIME ZONE and holds UTC wall time
        let call_start = record.call_start.naive_utc();

        let client = self.db_pool.get().await?;
        let statement = client.prepare_cached(INSERT_CDR).await?;

        let row = client
            .query_one(
                &statement,
                &[
                    &call_start,
                    &duration,
                    &record.calling_number,
                    &record.called_number,
                    &record.call_code,
                ],
            )
            .await?;

        let id: i32 = row.get("id");

        debug!(
            id,
            call_start = %record.call_start,
            duration = record.duration_seconds,
            calling = %record.calling_number,
            called = %record.called_number,
            "CDR stored"
        );

        Ok(())
    }
}
