// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded handoff queues.
//!
//! Producers never wait: a full queue drops the item and bumps a counter.
//! Overload is logged once when it starts and once when it ends, not per
//! dropped item.

use crate::metric::Metric;
use crate::sink::MetricSink;
use crate::stats::PipelineStats;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{info, trace, warn};

/// Which side of the decoder a queue sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Raw lines, socket readers to decode worker.
    Ingest,
    /// Decoded records, decode worker to drain.
    Output,
}

impl QueueKind {
    fn label(self) -> &'static str {
        match self {
            QueueKind::Ingest => "ingestion",
            QueueKind::Output => "output",
        }
    }

    fn drop_counter(self, stats: &PipelineStats) -> &AtomicU64 {
        match self {
            QueueKind::Ingest => &stats.lines_dropped,
            QueueKind::Output => &stats.records_dropped,
        }
    }
}

/// Non-blocking producer handle for a bounded queue.
///
/// Cheap to clone; every connection gets its own clone.
#[derive(Debug)]
pub struct DropOnFull<T> {
    tx: mpsc::Sender<T>,
    kind: QueueKind,
    stats: Arc<PipelineStats>,
    overloaded: Arc<AtomicBool>,
}

impl<T> Clone for DropOnFull<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            kind: self.kind,
            stats: self.stats.clone(),
            overloaded: self.overloaded.clone(),
        }
    }
}

impl<T> DropOnFull<T> {
    /// Try to enqueue `item`.
    ///
    /// Returns `false` if the item was dropped.
    pub fn offer(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => {
                if self.overloaded.swap(false, Ordering::Relaxed) {
                    info!(
                        "{} queue accepting again ({} dropped so far)",
                        self.kind.label(),
                        self.kind.drop_counter(&self.stats).load(Ordering::Relaxed)
                    );
                }
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                let counter = self.kind.drop_counter(&self.stats);
                let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
                if !self.overloaded.swap(true, Ordering::Relaxed) {
                    warn!(
                        "{} queue full, dropping ({} dropped so far)",
                        self.kind.label(),
                        total
                    );
                } else {
                    trace!("{} queue full, dropped item #{}", self.kind.label(), total);
                }
                false
            }
        }
    }

    /// Queue this handle feeds.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }
}

/// Create a bounded queue with a drop-on-full producer.
pub fn bounded<T>(
    capacity: usize,
    kind: QueueKind,
    stats: Arc<PipelineStats>,
) -> (DropOnFull<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let producer = DropOnFull {
        tx,
        kind,
        stats,
        overloaded: Arc::new(AtomicBool::new(false)),
    };
    (producer, rx)
}

/// Consumer side of the output queue.
///
/// Only [`OutputQueue::drain_into`] reads from it, and it never waits.
#[derive(Debug)]
pub struct OutputQueue {
    rx: Mutex<mpsc::Receiver<Metric>>,
    sweep_limit: usize,
    stats: Arc<PipelineStats>,
}

impl OutputQueue {
    /// Wrap the receiving end of the output queue.
    ///
    /// A single sweep forwards at most `sweep_limit` records, so a drain
    /// call returns even while the decoder keeps producing.
    pub fn new(rx: mpsc::Receiver<Metric>, sweep_limit: usize, stats: Arc<PipelineStats>) -> Self {
        Self {
            rx: Mutex::new(rx),
            sweep_limit,
            stats,
        }
    }

    /// Forward queued records to `sink` without waiting.
    ///
    /// Stops when the queue is empty or `sweep_limit` records have been
    /// forwarded. Returns the number of records forwarded.
    pub fn drain_into(&self, sink: &mut dyn MetricSink) -> usize {
        let mut rx = self.rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut forwarded = 0;
        while forwarded < self.sweep_limit {
            match rx.try_recv() {
                Ok(metric) => {
                    sink.add_fields(
                        &metric.name,
                        &metric.fields,
                        &metric.tags,
                        metric.timestamp,
                    );
                    forwarded += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        PipelineStats::add(&self.stats.records_drained, forwarded as u64);
        forwarded
    }
}
