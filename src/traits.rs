// src/traits.rs
use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::ParsedCdr;

/// Destination for parsed call records.
///
/// Every call is its own unit of work: one record, one write, one commit.
/// Implementations may block on I/O; only the calling connection waits.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CdrSink: Send + Sync {
    async fn store(&self, record: &ParsedCdr) -> Result<(), StoreError>;
}
