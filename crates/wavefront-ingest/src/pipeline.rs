// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingestion pipeline lifecycle.
//!
//! The pipeline owns both queues, the shared counters, and the shutdown
//! signal. `start` binds the listener and spawns the acceptor and the
//! decode worker; `drain` is called by the host collector whenever it
//! wants the records decoded so far.

use crate::config::{ConfigError, IngestConfig};
use crate::decoder::LineDecoder;
use crate::listener::Acceptor;
use crate::metric::Metric;
use crate::queue::{bounded, DropOnFull, OutputQueue, QueueKind};
use crate::shutdown::Shutdown;
use crate::sink::MetricSink;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::worker::DecodeWorker;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wavefront ingestion pipeline.
pub struct Pipeline {
    config: IngestConfig,
    stats: Arc<PipelineStats>,
    shutdown: Shutdown,
    lines: DropOnFull<String>,
    line_rx: Mutex<Option<mpsc::Receiver<String>>>,
    records: DropOnFull<Metric>,
    output: OutputQueue,
    listening: AtomicBool,
}

impl Pipeline {
    /// Build a pipeline. Nothing runs until [`Pipeline::start`].
    pub fn new(config: IngestConfig) -> Result<Self, IngestError> {
        config.validate()?;

        let stats = Arc::new(PipelineStats::new());
        let (lines, line_rx) = bounded(config.allowed_pending, QueueKind::Ingest, stats.clone());
        let (records, record_rx) =
            bounded(config.allowed_pending, QueueKind::Output, stats.clone());
        let output = OutputQueue::new(record_rx, config.allowed_pending, stats.clone());

        Ok(Self {
            config,
            stats,
            shutdown: Shutdown::new(),
            lines,
            line_rx: Mutex::new(Some(line_rx)),
            records,
            output,
            listening: AtomicBool::new(false),
        })
    }

    /// Start the decode worker and the listener.
    ///
    /// Returns once the socket is bound, with the address actually bound.
    /// A bind failure is returned to the caller and nothing is retried.
    pub async fn start(&self) -> Result<SocketAddr, IngestError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(IngestError::AlreadyRunning);
        }

        let acceptor = match Acceptor::bind(
            &self.config.address,
            self.lines.clone(),
            self.stats.clone(),
            self.shutdown.clone(),
            self.config.max_connections,
            self.config.max_line_length,
        )
        .await
        {
            Ok(acceptor) => acceptor,
            Err(e) => {
                self.listening.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let addr = acceptor.local_addr();

        self.spawn_decoder();
        tokio::spawn(acceptor.run());

        info!("Started the wavefront input on {}", addr);
        Ok(addr)
    }

    /// Spawn the decode worker, if it is not running yet.
    ///
    /// [`Pipeline::start`] calls this; calling it directly lets lines be
    /// queued through [`Pipeline::line_sender`] before decoding begins.
    pub fn spawn_decoder(&self) -> Option<JoinHandle<()>> {
        let line_rx = self
            .line_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()?;
        let worker = DecodeWorker::new(
            line_rx,
            LineDecoder::new(),
            self.records.clone(),
            self.stats.clone(),
        );
        Some(tokio::spawn(worker.run()))
    }

    /// Producer handle onto the ingestion queue.
    pub fn line_sender(&self) -> DropOnFull<String> {
        self.lines.clone()
    }

    /// Forward decoded records queued right now to `sink`.
    ///
    /// One call forwards at most `allowed_pending` records, so it returns
    /// even while the decoder keeps producing; anything beyond that is left
    /// for the next call. Never waits for new records; returns the number
    /// forwarded.
    pub fn drain(&self, sink: &mut dyn MetricSink) -> usize {
        self.output.drain_into(sink)
    }

    /// Stop accepting connections.
    ///
    /// Open connections and queued data are left to finish on their own.
    pub fn stop(&self) {
        if !self.shutdown.is_triggered() {
            info!("Stopping the wavefront input");
        }
        self.shutdown.trigger();
    }

    /// Shutdown signal shared with the acceptor.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Lines and records dropped because a queue was full.
    pub fn dropped(&self) -> u64 {
        self.stats.dropped()
    }

    /// Snapshot of all counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Active configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn local_config(allowed_pending: usize) -> IngestConfig {
        IngestConfig {
            address: "127.0.0.1:0".into(),
            allowed_pending,
            ..Default::default()
        }
    }

    async fn drain_until(pipeline: &Pipeline, sink: &mut Vec<Metric>, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while sink.len() < expected && tokio::time::Instant::now() < deadline {
            pipeline.drain(sink);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Pipeline::new(IngestConfig {
            allowed_pending: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn test_drain_empty_forwards_nothing() {
        let pipeline = Pipeline::new(local_config(4)).unwrap();
        let mut sink: Vec<Metric> = Vec::new();
        assert_eq!(pipeline.drain(&mut sink), 0);
        assert!(sink.is_empty());
        assert_eq!(pipeline.dropped(), 0);
    }

    #[tokio::test]
    async fn test_overflow_while_decoder_paused() {
        let pipeline = Pipeline::new(local_config(3)).unwrap();
        let sender = pipeline.line_sender();

        let accepted: Vec<bool> = (0..5)
            .map(|i| sender.offer(format!("load.avg {} host=h{}", i, i)))
            .collect();
        assert_eq!(accepted, vec![true, true, true, false, false]);
        assert_eq!(pipeline.dropped(), 2);

        pipeline.spawn_decoder().expect("decoder not yet spawned");
        assert!(pipeline.spawn_decoder().is_none());

        let mut sink = Vec::new();
        drain_until(&pipeline, &mut sink, 3).await;

        assert_eq!(sink.len(), 3);
        for (i, metric) in sink.iter().enumerate() {
            assert_eq!(metric.name, "load");
            assert_eq!(metric.field("avg").and_then(|v| v.as_f64()), Some(i as f64));
            assert_eq!(metric.tags["host"], format!("h{}", i));
        }

        // Room again once the worker has caught up.
        assert!(sender.offer("load.avg 9".into()));
        drain_until(&pipeline, &mut sink, 4).await;
        assert_eq!(sink.len(), 4);
        assert_eq!(pipeline.dropped(), 2);
        assert_eq!(pipeline.stats().records_drained, 4);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let pipeline = Pipeline::new(local_config(4)).unwrap();
        let addr = pipeline.start().await.unwrap();
        assert_ne!(addr.port(), 0);

        assert!(matches!(
            pipeline.start().await,
            Err(IngestError::AlreadyRunning)
        ));
        pipeline.stop();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported_to_caller() {
        let holder = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = holder.local_addr().unwrap().to_string();

        let pipeline = Pipeline::new(IngestConfig::with_address(taken)).unwrap();
        assert!(matches!(
            pipeline.start().await,
            Err(IngestError::Bind { .. })
        ));
    }
}
