// src/database/schema.rs
use tracing::info;

use super::DbPool;
use crate::error::CollectorError;

pub const CDR_TABLE: &str = "avaya_cdr";

const CREATE_CDR_TABLE: &str = "CREATE TABLE IF NOT EXISTS avaya_cdr (
    id SERIAL PRIMARY KEY,
    date TIMESTAMP NOT NULL,
    duration INTEGER NOT NULL,
    calling_number VARCHAR(64),
    called_number VARCHAR(64),
    call_code VARCHAR(64)
)";

/// Create the CDR table if it does not exist yet. Existing tables are left
/// untouched.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), CollectorError> {
    let client = pool.get().await?;
    client.batch_execute(CREATE_CDR_TABLE).await?;

    info!(table = CDR_TABLE, "CDR table ready");
    Ok(())
}
