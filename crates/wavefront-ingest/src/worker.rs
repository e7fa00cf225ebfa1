// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode worker: ingestion queue -> decoder -> output queue.

use crate::decoder::LineDecoder;
use crate::metric::Metric;
use crate::queue::DropOnFull;
use crate::stats::PipelineStats;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Single consumer of the ingestion queue.
pub struct DecodeWorker {
    lines: mpsc::Receiver<String>,
    decoder: LineDecoder,
    output: DropOnFull<Metric>,
    stats: Arc<PipelineStats>,
}

impl DecodeWorker {
    /// Create a worker over the given queues.
    pub fn new(
        lines: mpsc::Receiver<String>,
        decoder: LineDecoder,
        output: DropOnFull<Metric>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            lines,
            decoder,
            output,
            stats,
        }
    }

    /// Decode lines until every producer handle is gone.
    pub async fn run(mut self) {
        debug!("Decode worker started");
        while let Some(line) = self.lines.recv().await {
            self.process(&line);
        }
        debug!("Decode worker stopped");
    }

    /// Decode one line and enqueue the result without waiting.
    fn process(&self, line: &str) {
        match self.decoder.decode_line(line) {
            Ok(decoded) => {
                if !decoded.skipped_tags.is_empty() {
                    PipelineStats::add(
                        &self.stats.tags_skipped,
                        decoded.skipped_tags.len() as u64,
                    );
                }
                PipelineStats::incr(&self.stats.records_decoded);
                trace!("Decoded {}", decoded.metric.name);
                self.output.offer(decoded.metric);
            }
            Err(e) => {
                PipelineStats::incr(&self.stats.decode_failures);
                debug!("Discarding line {:?}: {}", line, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::FieldValue;
    use crate::queue::{bounded, QueueKind};
    use std::time::Duration;

    #[tokio::test]
    async fn test_worker_decodes_in_order() {
        let stats = Arc::new(PipelineStats::new());
        let (line_tx, line_rx) = bounded::<String>(8, QueueKind::Ingest, stats.clone());
        let (out_tx, mut out_rx) = bounded::<Metric>(8, QueueKind::Output, stats.clone());

        let worker = DecodeWorker::new(line_rx, LineDecoder::new(), out_tx, stats.clone());

        line_tx.offer("a.x 1".into());
        line_tx.offer("uptime 42".into());
        line_tx.offer("a.x NaN".into());
        line_tx.offer("a.x 2 broken k=v".into());
        drop(line_tx);

        tokio::time::timeout(Duration::from_secs(1), worker.run())
            .await
            .expect("worker should stop when producers are gone");

        let first = out_rx.try_recv().unwrap();
        let second = out_rx.try_recv().unwrap();
        assert!(out_rx.try_recv().is_err());

        assert_eq!(first.field("x"), Some(FieldValue::Float(1.0)));
        assert_eq!(second.field("x"), Some(FieldValue::Float(2.0)));
        assert_eq!(second.tags.len(), 1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_decoded, 2);
        assert_eq!(snapshot.decode_failures, 2);
        assert_eq!(snapshot.tags_skipped, 1);
    }

    #[tokio::test]
    async fn test_worker_drops_on_full_output() {
        let stats = Arc::new(PipelineStats::new());
        let (line_tx, line_rx) = bounded::<String>(8, QueueKind::Ingest, stats.clone());
        let (out_tx, _out_rx) = bounded::<Metric>(1, QueueKind::Output, stats.clone());

        let worker = DecodeWorker::new(line_rx, LineDecoder::new(), out_tx, stats.clone());
        for i in 0..4 {
            line_tx.offer(format!("a.x {}", i));
        }
        drop(line_tx);

        tokio::time::timeout(Duration::from_secs(1), worker.run())
            .await
            .expect("worker must not block on a full output queue");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_decoded, 4);
        assert_eq!(snapshot.records_dropped, 3);
        assert_eq!(stats.dropped(), 3);
    }
}
