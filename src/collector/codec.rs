// src/collector/codec.rs
//! Newline framing for the switch's CDR stream
//!
//! Lines end in `\n` (a trailing `\r` is dropped). Bytes that are not valid
//! UTF-8 are skipped rather than failing the connection. A line longer than
//! the limit is thrown away up to its newline and reported as
//! [`Frame::Oversized`] so the stream keeps going.

use std::{cmp, io};

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// A line over the length limit was dropped
    Oversized { discarded: usize },
}

#[derive(Debug)]
pub struct CdrLineCodec {
    max_length: usize,
    /// Where to resume the newline scan in a partially received line
    next_index: usize,
    discarding: bool,
    discarded: usize,
}

impl CdrLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            discarded: 0,
        }
    }

    fn finish_discard(&mut self, extra: usize) -> Frame {
        let discarded = self.discarded + extra;
        self.discarding = false;
        self.discarded = 0;
        self.next_index = 0;
        Frame::Oversized { discarded }
    }
}

impl Decoder for CdrLineCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        loop {
            // One byte past the limit so a full-length line still finds its '\n'
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    let end = self.next_index + offset + 1;
                    buf.advance(end);
                    return Ok(Some(self.finish_discard(end)));
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.discarded += read_to;
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    return Ok(Some(Frame::Line(decode_line(&line[..end]))));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        if self.discarding {
            let rest = buf.len();
            buf.clear();
            return Ok(Some(self.finish_discard(rest)));
        }

        if buf.is_empty() {
            return Ok(None);
        }

        // Last line without a terminating newline
        self.next_index = 0;
        let line = buf.split_to(buf.len());
        Ok(Some(Frame::Line(decode_line(&line))))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(line) => line.to_string(),
        Err(_) => String::from_utf8_lossy(bytes)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Option<Frame> {
        Some(Frame::Line(s.to_string()))
    }

    #[test]
    fn test_splits_on_newline() {
        let mut codec = CdrLineCodec::new(64);
        let mut buf = BytesMut::from("first\nsecond\r\nthi");

        assert_eq!(codec.decode(&mut buf).unwrap(), line("first"));
        assert_eq!(codec.decode(&mut buf).unwrap(), line("second"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"rd\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), line("third"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_lines_are_frames() {
        let mut codec = CdrLineCodec::new(64);
        let mut buf = BytesMut::from("\n\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), line(""));
        assert_eq!(codec.decode(&mut buf).unwrap(), line(""));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_line_at_exact_limit_is_kept() {
        let mut codec = CdrLineCodec::new(5);
        let mut buf = BytesMut::from("12345\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), line("12345"));
    }

    #[test]
    fn test_oversized_line_is_discarded() {
        let mut codec = CdrLineCodec::new(8);
        let mut buf = BytesMut::from("0123456789abcdef\nok\n");

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Oversized { discarded: 17 })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), line("ok"));
    }

    #[test]
    fn test_oversized_line_across_reads() {
        let mut codec = CdrLineCodec::new(4);
        let mut buf = BytesMut::from("abcdefgh");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"ijk\nnext\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Oversized { discarded: 12 })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), line("next"));
    }

    #[test]
    fn test_unterminated_last_line_at_eof() {
        let mut codec = CdrLineCodec::new(64);
        let mut buf = BytesMut::from("done\nlast");

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), line("done"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), line("last"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversized_tail_at_eof() {
        let mut codec = CdrLineCodec::new(4);
        let mut buf = BytesMut::from("abcdefgh");

        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(Frame::Oversized { discarded: 8 })
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8_bytes_are_dropped() {
        let mut codec = CdrLineCodec::new(64);
        let mut buf = BytesMut::from(&b"1503\xff24 1430\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), line("150324 1430"));
    }
}
