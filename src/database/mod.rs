// src/database/mod.rs
pub mod cdr_sink;
pub mod pool;
pub mod schema;

pub use cdr_sink::PgCdrSink;
pub use pool::{create_pool, DbPool};
pub use schema::ensure_schema;
