// src/models/cdr.rs
use chrono::{DateTime, Duration, Utc};

/// A call record decoded from one line of the switch's CDR stream.
///
/// Built only by the line parser, and only from a line that passed every
/// format check. The wire carries the moment the call ended; `call_start`
/// is derived from it by subtracting the duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCdr {
    pub call_start: DateTime<Utc>,
    pub duration_seconds: u32,
    pub calling_number: String,
    pub called_number: String,
    pub call_code: String,
}

impl ParsedCdr {
    /// Moment the call ended, as it was encoded on the wire.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.call_start + Duration::seconds(i64::from(self.duration_seconds))
    }
}
