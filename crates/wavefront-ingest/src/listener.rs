// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP listener and per-connection line readers.
//!
//! ```text
//! TcpListener --accept--> LineReader (one task per connection)
//!                              |
//!                              +--offer--> ingestion queue (drop on full)
//! ```

use crate::queue::DropOnFull;
use crate::shutdown::Shutdown;
use crate::stats::PipelineStats;
use crate::IngestError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Pause after a failed accept (e.g. `EMFILE`) before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Outcome of one bounded line read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadLine {
    /// A complete line is in the buffer (terminator removed).
    Line,
    /// The line exceeded the limit and was skipped up to its terminator.
    TooLong,
    /// End of stream. `partial` is set if unterminated bytes were discarded.
    Eof { partial: bool },
}

/// Read up to the next `\n` into `buf`, never buffering more than `max` bytes.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<ReadLine> {
    let mut too_long = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(ReadLine::Eof {
                partial: too_long || !buf.is_empty(),
            });
        }

        let (chunk_len, found_newline) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => (i, true),
            None => (available.len(), false),
        };

        if !too_long {
            if buf.len() + chunk_len > max {
                too_long = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..chunk_len]);
            }
        }

        let consumed = if found_newline { chunk_len + 1 } else { chunk_len };
        reader.consume(consumed);

        if found_newline {
            return Ok(if too_long {
                ReadLine::TooLong
            } else {
                ReadLine::Line
            });
        }
    }
}

/// Reads newline-delimited text from one connection into the ingestion queue.
pub struct LineReader<R> {
    reader: BufReader<R>,
    peer_addr: SocketAddr,
    lines: DropOnFull<String>,
    stats: Arc<PipelineStats>,
    max_line_length: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a reader over `stream`.
    pub fn new(
        stream: R,
        peer_addr: SocketAddr,
        lines: DropOnFull<String>,
        stats: Arc<PipelineStats>,
        max_line_length: usize,
    ) -> Self {
        Self {
            reader: BufReader::new(stream),
            peer_addr,
            lines,
            stats,
            max_line_length,
        }
    }

    /// Read until end of stream or a read error.
    ///
    /// A full ingestion queue never slows the reader down; lines are
    /// dropped and counted instead. Returns the number of lines offered.
    pub async fn run(mut self) -> std::io::Result<u64> {
        let mut buf = Vec::with_capacity(1024);
        let mut offered = 0u64;

        loop {
            buf.clear();
            match read_bounded_line(&mut self.reader, &mut buf, self.max_line_length).await? {
                ReadLine::Line => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim();
                    if line.is_empty() {
                        continue;
                    }
                    PipelineStats::incr(&self.stats.lines_received);
                    self.lines.offer(line.to_string());
                    offered += 1;
                }
                ReadLine::TooLong => {
                    PipelineStats::incr(&self.stats.lines_too_long);
                    debug!(
                        "Line from {} exceeds {} bytes, dropped",
                        self.peer_addr, self.max_line_length
                    );
                }
                ReadLine::Eof { partial } => {
                    if partial {
                        debug!("Discarding unterminated line from {}", self.peer_addr);
                    }
                    return Ok(offered);
                }
            }
        }
    }
}

/// Accepts connections and spawns a [`LineReader`] for each one.
pub struct Acceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    lines: DropOnFull<String>,
    stats: Arc<PipelineStats>,
    shutdown: Shutdown,
    limiter: Option<Arc<Semaphore>>,
    max_line_length: usize,
}

impl Acceptor {
    /// Bind the listening socket.
    ///
    /// Failure here is fatal for the input and is not retried.
    pub async fn bind(
        address: &str,
        lines: DropOnFull<String>,
        stats: Arc<PipelineStats>,
        shutdown: Shutdown,
        max_connections: usize,
        max_line_length: usize,
    ) -> Result<Self, IngestError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| IngestError::Bind {
                address: address.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let limiter = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Ok(Self {
            listener,
            local_addr,
            lines,
            stats,
            shutdown,
            limiter,
            max_line_length,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the shutdown signal fires.
    ///
    /// Readers already spawned keep running until their peer disconnects.
    pub async fn run(self) {
        info!("Listening on {}", self.local_addr);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => self.spawn_reader(stream, peer_addr),
                        Err(e) => {
                            warn!("Error accepting connection: {}", e);
                            if !self.backoff().await {
                                break;
                            }
                        }
                    }
                }
                _ = self.shutdown.wait() => {
                    info!("Stopping listener on {}", self.local_addr);
                    break;
                }
            }
        }
    }

    /// Sleep after an accept error. Returns `false` if shutdown fired meanwhile.
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
            _ = self.shutdown.wait() => {
                info!("Stopping listener on {}", self.local_addr);
                false
            }
        }
    }

    fn spawn_reader(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let permit: Option<OwnedSemaphorePermit> = match &self.limiter {
            Some(limiter) => match limiter.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    PipelineStats::incr(&self.stats.connections_rejected);
                    warn!("Connection limit reached, rejecting {}", peer_addr);
                    drop(stream);
                    return;
                }
            },
            None => None,
        };

        debug!("New connection from {}", peer_addr);
        self.stats.connection_opened();

        let reader = LineReader::new(
            stream,
            peer_addr,
            self.lines.clone(),
            self.stats.clone(),
            self.max_line_length,
        );
        let stats = self.stats.clone();

        tokio::spawn(async move {
            let _permit = permit;
            match reader.run().await {
                Ok(lines) => debug!("Connection closed: {} ({} lines)", peer_addr, lines),
                Err(e) => debug!("Read error from {}: {}", peer_addr, e),
            }
            stats.connection_closed();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{bounded, QueueKind};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_read_bounded_line() {
        let mut input: &[u8] = b"first\nsecond line\r\nno-newline";
        let mut reader = BufReader::new(&mut input);
        let mut buf = Vec::new();

        assert_eq!(
            read_bounded_line(&mut reader, &mut buf, 64).await.unwrap(),
            ReadLine::Line
        );
        assert_eq!(buf, b"first");

        buf.clear();
        assert_eq!(
            read_bounded_line(&mut reader, &mut buf, 64).await.unwrap(),
            ReadLine::Line
        );
        assert_eq!(buf, b"second line\r");

        buf.clear();
        assert_eq!(
            read_bounded_line(&mut reader, &mut buf, 64).await.unwrap(),
            ReadLine::Eof { partial: true }
        );
    }

    #[tokio::test]
    async fn test_read_bounded_line_too_long() {
        let mut input: &[u8] = b"0123456789abcdef\nok\n";
        let mut reader = BufReader::with_capacity(4, &mut input);
        let mut buf = Vec::new();

        assert_eq!(
            read_bounded_line(&mut reader, &mut buf, 8).await.unwrap(),
            ReadLine::TooLong
        );

        buf.clear();
        assert_eq!(
            read_bounded_line(&mut reader, &mut buf, 8).await.unwrap(),
            ReadLine::Line
        );
        assert_eq!(buf, b"ok");

        buf.clear();
        assert_eq!(
            read_bounded_line(&mut reader, &mut buf, 8).await.unwrap(),
            ReadLine::Eof { partial: false }
        );
    }

    #[tokio::test]
    async fn test_line_reader_trims_and_enqueues() {
        let stats = Arc::new(PipelineStats::new());
        let (tx, mut rx) = bounded::<String>(8, QueueKind::Ingest, stats.clone());
        let input: &[u8] = b"  a.b 1  \n\n\t\nc.d 2\r\n";

        let offered = LineReader::new(input, peer(), tx, stats.clone(), 1024)
            .run()
            .await
            .unwrap();

        assert_eq!(offered, 2);
        assert_eq!(rx.try_recv().unwrap(), "a.b 1");
        assert_eq!(rx.try_recv().unwrap(), "c.d 2");
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.snapshot().lines_received, 2);
    }

    #[tokio::test]
    async fn test_line_reader_keeps_reading_when_full() {
        let stats = Arc::new(PipelineStats::new());
        let (tx, mut rx) = bounded::<String>(2, QueueKind::Ingest, stats.clone());
        let input: &[u8] = b"a.b 1\na.b 2\na.b 3\na.b 4\na.b 5\n";

        let offered = LineReader::new(input, peer(), tx, stats.clone(), 1024)
            .run()
            .await
            .unwrap();

        assert_eq!(offered, 5);
        assert_eq!(stats.snapshot().lines_dropped, 3);
        assert_eq!(rx.try_recv().unwrap(), "a.b 1");
        assert_eq!(rx.try_recv().unwrap(), "a.b 2");
    }

    #[tokio::test]
    async fn test_line_reader_counts_long_lines() {
        let stats = Arc::new(PipelineStats::new());
        let (tx, mut rx) = bounded::<String>(8, QueueKind::Ingest, stats.clone());
        let long = format!("a.b {}\nc.d 1\n", "9".repeat(100));

        LineReader::new(long.as_bytes(), peer(), tx, stats.clone(), 32)
            .run()
            .await
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), "c.d 1");
        assert_eq!(stats.snapshot().lines_too_long, 1);
    }

    async fn bound_acceptor(shutdown: Shutdown) -> Acceptor {
        let stats = Arc::new(PipelineStats::new());
        let (tx, _rx) = bounded::<String>(8, QueueKind::Ingest, stats.clone());
        Acceptor::bind("127.0.0.1:0", tx, stats, shutdown, 0, 64)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_accept_backoff_waits() {
        let acceptor = bound_acceptor(Shutdown::new()).await;

        let started = std::time::Instant::now();
        assert!(acceptor.backoff().await);
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }

    #[tokio::test]
    async fn test_accept_backoff_ends_on_shutdown() {
        let shutdown = Shutdown::new();
        let acceptor = bound_acceptor(shutdown.clone()).await;
        shutdown.trigger();

        let resumed = tokio::time::timeout(Duration::from_millis(50), acceptor.backoff())
            .await
            .expect("backoff should not outlast shutdown");
        assert!(!resumed);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let stats = Arc::new(PipelineStats::new());
        let (tx, _rx) = bounded::<String>(8, QueueKind::Ingest, stats.clone());

        let first = Acceptor::bind(
            "127.0.0.1:0",
            tx.clone(),
            stats.clone(),
            Shutdown::new(),
            0,
            64,
        )
        .await
        .unwrap();
        let taken = first.local_addr().to_string();

        let second = Acceptor::bind(&taken, tx, stats, Shutdown::new(), 0, 64).await;
        assert!(matches!(second, Err(IngestError::Bind { .. })));
    }
}
