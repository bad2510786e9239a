//! Avaya CDR collector
//!
//! Listens on a TCP port for the call detail records an Avaya switch streams
//! out, one line per call, and stores each decoded record in PostgreSQL.
//!
//! ```text
//! CdrServer (accept loop)
//!     |  one task per connection
//!     v
//! ConnectionHandler -- CdrLineCodec (framing)
//!     |
//!     v
//! parse_cdr_line -> ParsedCdr
//!     |
//!     v
//! CdrSink (PgCdrSink -> avaya_cdr)
//! ```

pub mod collector;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod parser;
pub mod traits;

pub use config::Config;
pub use error::{CollectorError, StoreError};
pub use models::ParsedCdr;
pub use parser::{parse_cdr_line, InvalidLine};
pub use traits::CdrSink;
