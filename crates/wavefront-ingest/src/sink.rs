// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collector-facing sinks.
//!
//! Drain hands every record to a [`MetricSink`]. The host collector
//! provides the real implementation; the ones here cover embedding,
//! tests, and the command-line host.

use crate::metric::{FieldValue, Metric};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;
use tracing::warn;

/// Accumulation interface of the host collector.
pub trait MetricSink {
    /// Accept one record.
    fn add_fields(
        &mut self,
        measurement: &str,
        fields: &HashMap<String, FieldValue>,
        tags: &HashMap<String, String>,
        timestamp: Option<DateTime<Utc>>,
    );
}

impl MetricSink for Vec<Metric> {
    fn add_fields(
        &mut self,
        measurement: &str,
        fields: &HashMap<String, FieldValue>,
        tags: &HashMap<String, String>,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.push(Metric {
            name: measurement.to_string(),
            fields: fields.clone(),
            tags: tags.clone(),
            timestamp,
        });
    }
}

/// Writes each record as one JSON object per line.
///
/// Records without a source timestamp are stamped with the time they
/// reach the sink.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
    errors: u64,
}

impl<W: Write> JsonLinesSink<W> {
    /// Create a sink over `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            errors: 0,
        }
    }

    /// Records written successfully.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Records that failed to serialize or write.
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// Consume the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &JsonRecord<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")
    }
}

#[derive(serde::Serialize)]
struct JsonRecord<'a> {
    name: &'a str,
    fields: &'a HashMap<String, FieldValue>,
    tags: &'a HashMap<String, String>,
    timestamp: DateTime<Utc>,
}

impl<W: Write> MetricSink for JsonLinesSink<W> {
    fn add_fields(
        &mut self,
        measurement: &str,
        fields: &HashMap<String, FieldValue>,
        tags: &HashMap<String, String>,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let record = JsonRecord {
            name: measurement,
            fields,
            tags,
            timestamp: timestamp.unwrap_or_else(Utc::now),
        };
        match self.write_record(&record) {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.errors += 1;
                warn!("Failed to write record {}: {}", measurement, e);
            }
        }
    }
}
