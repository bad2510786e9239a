// src/collector/handler.rs
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::codec::{CdrLineCodec, Frame};
use crate::parser::parse_cdr_line;
use crate::traits::CdrSink;

/// What happened to a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    Invalid,
    Stored,
    StoreFailed,
}

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    Eof,
    Shutdown,
    ReadError,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub lines: u64,
    pub stored: u64,
    pub invalid: u64,
    pub store_failures: u64,
    pub blank: u64,
    pub oversized: u64,
}

impl ConnectionStats {
    fn record(&mut self, outcome: LineOutcome) {
        self.lines += 1;
        match outcome {
            LineOutcome::Blank => self.blank += 1,
            LineOutcome::Invalid => self.invalid += 1,
            LineOutcome::Stored => self.stored += 1,
            LineOutcome::StoreFailed => self.store_failures += 1,
        }
    }
}

/// Per-connection read loop: frame, parse, store, one line at a time.
pub struct ConnectionHandler {
    sink: Arc<dyn CdrSink>,
    max_line_length: usize,
}

impl ConnectionHandler {
    pub fn new(sink: Arc<dyn CdrSink>, max_line_length: usize) -> Self {
        Self {
            sink,
            max_line_length,
        }
    }

    /// Read lines until EOF, a read error, or shutdown.
    ///
    /// Shutdown is only observed between lines, so a record that is being
    /// stored when it fires is still written.
    pub async fn handle<R>(
        &self,
        reader: R,
        shutdown: &CancellationToken,
    ) -> (ConnectionStats, Disconnect)
    where
        R: AsyncRead + Unpin,
    {
        let mut frames = FramedRead::new(reader, CdrLineCodec::new(self.max_line_length));
        let mut stats = ConnectionStats::default();

        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Shutdown requested, closing connection");
                    return (stats, Disconnect::Shutdown);
                }
                frame = frames.next() => frame,
            };

            match frame {
                None => return (stats, Disconnect::Eof),
                Some(Err(e)) => {
                    error!(error = %e, "Error reading from client");
                    return (stats, Disconnect::ReadError);
                }
                Some(Ok(Frame::Oversized { discarded })) => {
                    stats.oversized += 1;
                    warn!(
                        discarded,
                        max_line_length = self.max_line_length,
                        "Discarded line over the length limit"
                    );
                }
                Some(Ok(Frame::Line(line))) => {
                    let outcome = self.process_line(&line).await;
                    stats.record(outcome);
                }
            }
        }
    }

    pub async fn process_line(&self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Blank;
        }

        let record = match parse_cdr_line(line) {
            Ok(record) => record,
            Err(_) => {
                warn!(line, "Could not parse line");
                return LineOutcome::Invalid;
            }
        };

        match self.sink.store(&record).await {
            Ok(()) => LineOutcome::Stored,
            Err(e) => {
                error!(line, error = %e, code = e.error_code(), "DB insert failed");
                LineOutcome::StoreFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::traits::MockCdrSink;
    use mockall::Sequence;
    use std::io;
    use tokio_test::io::Builder;

    const LINE_A: &str = "150324 1430 125 5551234 10 5559999";
    const LINE_B: &str = "010125 235959 15930 111 22 333";

    fn handler(sink: MockCdrSink) -> ConnectionHandler {
        ConnectionHandler::new(Arc::new(sink), 128)
    }

    #[tokio::test]
    async fn test_stores_lines_in_order() {
        let mut sink = MockCdrSink::new();
        let mut seq = Sequence::new();
        sink.expect_store()
            .withf(|record| record.calling_number == "5559999" && record.duration_seconds == 125)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sink.expect_store()
            .withf(|record| record.calling_number == "333" && record.duration_seconds == 7170)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let input = format!("{}\r\n{}\n", LINE_A, LINE_B);
        let reader = Builder::new().read(input.as_bytes()).build();

        let (stats, reason) = handler(sink)
            .handle(reader, &CancellationToken::new())
            .await;

        assert_eq!(reason, Disconnect::Eof);
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.stored, 2);
    }

    #[tokio::test]
    async fn test_blank_and_invalid_lines_never_reach_sink() {
        let mut sink = MockCdrSink::new();
        sink.expect_store().times(0);

        let reader = Builder::new()
            .read(b"\n   \t\nnot a cdr\n010125 0000 abc 1 2 3\n320125 1000 100 1 2 3\n")
            .build();

        let (stats, reason) = handler(sink)
            .handle(reader, &CancellationToken::new())
            .await;

        assert_eq!(reason, Disconnect::Eof);
        assert_eq!(stats.blank, 2);
        assert_eq!(stats.invalid, 3);
        assert_eq!(stats.stored, 0);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_next_line() {
        let mut sink = MockCdrSink::new();
        let mut seq = Sequence::new();
        sink.expect_store()
            .withf(|record| record.calling_number == "5559999")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|record| Err(StoreError::DurationOutOfRange(record.duration_seconds)));
        sink.expect_store()
            .withf(|record| record.calling_number == "333")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let input = format!("{}\n{}\n", LINE_A, LINE_B);
        let reader = Builder::new().read(input.as_bytes()).build();

        let (stats, _) = handler(sink)
            .handle(reader, &CancellationToken::new())
            .await;

        assert_eq!(stats.store_failures, 1);
        assert_eq!(stats.stored, 1);
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let mut sink = MockCdrSink::new();
        sink.expect_store().times(1).returning(|_| Ok(()));

        let input = format!("{}\n{}\n", "9".repeat(500), LINE_A);
        let reader = Builder::new().read(input.as_bytes()).build();

        let (stats, reason) = handler(sink)
            .handle(reader, &CancellationToken::new())
            .await;

        assert_eq!(reason, Disconnect::Eof);
        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.stored, 1);
    }

    #[tokio::test]
    async fn test_line_split_across_reads_and_unterminated_tail() {
        let mut sink = MockCdrSink::new();
        sink.expect_store().times(2).returning(|_| Ok(()));

        let reader = Builder::new()
            .read(b"150324 1430 12")
            .read(b"5 5551234 10 5559999\n")
            .read(LINE_B.as_bytes())
            .build();

        let (stats, reason) = handler(sink)
            .handle(reader, &CancellationToken::new())
            .await;

        assert_eq!(reason, Disconnect::Eof);
        assert_eq!(stats.stored, 2);
    }

    #[tokio::test]
    async fn test_read_error_ends_connection() {
        let mut sink = MockCdrSink::new();
        sink.expect_store().times(1).returning(|_| Ok(()));

        let input = format!("{}\n", LINE_A);
        let reader = Builder::new()
            .read(input.as_bytes())
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let (stats, reason) = handler(sink)
            .handle(reader, &CancellationToken::new())
            .await;

        assert_eq!(reason, Disconnect::ReadError);
        assert_eq!(stats.stored, 1);
    }

    #[tokio::test]
    async fn test_shutdown_while_idle() {
        let mut sink = MockCdrSink::new();
        sink.expect_store().times(0);

        // Keep the writer alive so the read side stays pending
        let (_client, server) = tokio::io::duplex(64);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let (stats, reason) = handler(sink).handle(server, &shutdown).await;

        assert_eq!(reason, Disconnect::Shutdown);
        assert_eq!(stats, ConnectionStats::default());
    }

    #[tokio::test]
    async fn test_process_line_outcomes() {
        let mut sink = MockCdrSink::new();
        sink.expect_store().times(1).returning(|_| Ok(()));
        let handler = handler(sink);

        assert_eq!(handler.process_line("  ").await, LineOutcome::Blank);
        assert_eq!(handler.process_line("1 2 3").await, LineOutcome::Invalid);
        assert_eq!(handler.process_line(LINE_A).await, LineOutcome::Stored);
    }
}
