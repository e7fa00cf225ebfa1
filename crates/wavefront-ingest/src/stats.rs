// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pipeline counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared by every pipeline task.
///
/// All updates are single relaxed atomic increments; nothing here needs
/// ordering with respect to the queues.
#[derive(Debug)]
pub struct PipelineStats {
    /// Lines read off sockets.
    pub lines_received: AtomicU64,

    /// Lines dropped because the ingestion queue was full.
    pub lines_dropped: AtomicU64,

    /// Lines discarded because they exceeded the maximum line length.
    pub lines_too_long: AtomicU64,

    /// Lines the decoder rejected.
    pub decode_failures: AtomicU64,

    /// Tag tokens skipped on otherwise valid lines.
    pub tags_skipped: AtomicU64,

    /// Records produced by the decoder.
    pub records_decoded: AtomicU64,

    /// Records dropped because the output queue was full.
    pub records_dropped: AtomicU64,

    /// Records handed to a sink by drain.
    pub records_drained: AtomicU64,

    /// Connections accepted.
    pub connections_accepted: AtomicU64,

    /// Connections currently being read.
    pub connections_active: AtomicU64,

    /// Connections closed on accept because of the connection cap.
    pub connections_rejected: AtomicU64,

    /// Creation time.
    pub created: Instant,
}

impl PipelineStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self {
            lines_received: AtomicU64::new(0),
            lines_dropped: AtomicU64::new(0),
            lines_too_long: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            tags_skipped: AtomicU64::new(0),
            records_decoded: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            records_drained: AtomicU64::new(0),
            connections_accepted: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn connection_opened(&self) {
        Self::incr(&self.connections_accepted);
        Self::incr(&self.connections_active);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Total records lost to full queues, on either side of the decoder.
    pub fn dropped(&self) -> u64 {
        self.lines_dropped.load(Ordering::Relaxed) + self.records_dropped.load(Ordering::Relaxed)
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
            lines_too_long: self.lines_too_long.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            tags_skipped: self.tags_skipped.load(Ordering::Relaxed),
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            records_drained: self.records_drained.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub lines_received: u64,
    pub lines_dropped: u64,
    pub lines_too_long: u64,
    pub decode_failures: u64,
    pub tags_skipped: u64,
    pub records_decoded: u64,
    pub records_dropped: u64,
    pub records_drained: u64,
    pub connections_accepted: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Lines plus records lost to full queues.
    pub fn dropped(&self) -> u64 {
        self.lines_dropped + self.records_dropped
    }

    /// Calculate received lines per second.
    pub fn lines_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.lines_received as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_sums_both_queues() {
        let stats = PipelineStats::new();
        PipelineStats::add(&stats.lines_dropped, 3);
        PipelineStats::incr(&stats.records_dropped);

        assert_eq!(stats.dropped(), 4);
        assert_eq!(stats.snapshot().dropped(), 4);
    }

    #[test]
    fn test_connection_gauges() {
        let stats = PipelineStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 2);
        assert_eq!(snapshot.connections_active, 1);
    }

    #[test]
    fn test_rate_without_uptime() {
        let snapshot = StatsSnapshot {
            lines_received: 10,
            ..Default::default()
        };
        assert_eq!(snapshot.lines_per_second(), 0.0);
    }
}
