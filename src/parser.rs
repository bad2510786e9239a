// src/parser.rs
//! Avaya CDR line parser
//!
//! The switch writes one call per line as whitespace-separated tokens:
//!
//! ```text
//! DDMMYY  HHMM[SS]  DURATION  CALLED  CODE  CALLING  [ignored...]
//! 150324  1430      125       5551234 10    5559999
//! ```
//!
//! Date and time mark the end of the call. The duration is either plain
//! seconds (up to three digits) or a positional `H MM S...` encoding, and
//! the call start is derived from both.

use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::models::ParsedCdr;

/// Number of leading tokens that carry data; anything after is ignored.
pub const CDR_FIELD_COUNT: usize = 6;

/// Durations with more digits than this use the `H MM S...` layout.
const PLAIN_SECONDS_MAX_DIGITS: usize = 3;

/// The line could not be decoded into a call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not parse CDR line")]
pub struct InvalidLine;

/// Parse one raw CDR line.
///
/// Either every field decodes and a full record is returned, or the line is
/// rejected as a whole. Logging the rejected line is left to the caller.
pub fn parse_cdr_line(line: &str) -> Result<ParsedCdr, InvalidLine> {
    let mut tokens = line.split_whitespace();
    let mut fields = [""; CDR_FIELD_COUNT];
    for field in fields.iter_mut() {
        *field = tokens.next().ok_or(InvalidLine)?;
    }
    let [date, time, duration, called, code, calling] = fields;

    let (year, month, day) = parse_date(date)?;
    let (hour, minute, second) = parse_time(time)?;
    let duration_seconds = parse_duration(duration)?;

    let end_time = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or(InvalidLine)?
        .and_utc();

    let call_start = end_time
        .checked_sub_signed(Duration::seconds(i64::from(duration_seconds)))
        .ok_or(InvalidLine)?;

    Ok(ParsedCdr {
        call_start,
        duration_seconds,
        calling_number: calling.to_string(),
        called_number: called.to_string(),
        call_code: code.to_string(),
    })
}

impl FromStr for ParsedCdr {
    type Err = InvalidLine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cdr_line(s)
    }
}

/// `DDMMYY`, only the first six characters are read. Years are 20YY.
fn parse_date(field: &str) -> Result<(i32, u32, u32), InvalidLine> {
    if field.chars().count() < 6 {
        return Err(InvalidLine);
    }

    let day = two_digits(field, 0)?;
    let month = two_digits(field, 2)?;
    let year = 2000 + two_digits(field, 4)? as i32;

    Ok((year, month, day))
}

/// `HHMM` (seconds default to zero) or `HHMMSS`.
fn parse_time(field: &str) -> Result<(u32, u32, u32), InvalidLine> {
    let second = match field.chars().count() {
        4 => 0,
        6 => two_digits(field, 4)?,
        _ => return Err(InvalidLine),
    };

    Ok((two_digits(field, 0)?, two_digits(field, 2)?, second))
}

/// Non-digits are dropped before decoding, so `1:05:30` reads as `10530`.
///
/// Longer than three digits: one digit of hours, two of minutes, and the
/// rest are seconds. Calls of ten hours or more cannot be represented.
fn parse_duration(field: &str) -> Result<u32, InvalidLine> {
    let digits: String = field.chars().filter(char::is_ascii_digit).collect();

    if digits.len() <= PLAIN_SECONDS_MAX_DIGITS {
        return number(&digits);
    }

    let hours = number(&digits[..1])?;
    let minutes = number(&digits[1..3])?;
    let seconds = number(&digits[3..])?;

    (hours * 3600 + minutes * 60)
        .checked_add(seconds)
        .ok_or(InvalidLine)
}

fn two_digits(field: &str, at: usize) -> Result<u32, InvalidLine> {
    field.get(at..at + 2).ok_or(InvalidLine).and_then(number)
}

fn number(digits: &str) -> Result<u32, InvalidLine> {
    digits.parse().map_err(|_| InvalidLine)
}
