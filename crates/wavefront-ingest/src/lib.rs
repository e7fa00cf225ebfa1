// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wavefront Line Protocol Input
//!
//! Accepts wavefront-formatted metrics over TCP, decodes them, and keeps
//! the decoded records until the host collector drains them.
//!
//! # Pipeline
//!
//! ```text
//! TCP --> LineReader (per connection) --> ingestion queue --> DecodeWorker
//!                                           (bounded)              |
//!                                                                  v
//!             host collector <-- drain() <-- output queue <--------+
//!                                              (bounded)
//! ```
//!
//! Both queues drop new items when full and count the drops; producers
//! never wait. Delivery is best effort and at most once.
//!
//! # Wire format
//!
//! ```text
//! <namespace.metric.path> <value> [<epoch-seconds>] [<tag>=<value> ...]
//! docker.n.images 30 1496156870 engine_host="fib-r10-u05" source="fib-r10-u05"
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use wavefront_ingest::{IngestConfig, Metric, Pipeline};
//!
//! # async fn example() -> Result<(), wavefront_ingest::IngestError> {
//! let pipeline = Pipeline::new(IngestConfig::with_address("0.0.0.0:2878"))?;
//! pipeline.start().await?;
//!
//! let mut collected: Vec<Metric> = Vec::new();
//! pipeline.drain(&mut collected);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decoder;
pub mod listener;
pub mod metric;
pub mod pipeline;
pub mod queue;
pub mod shutdown;
pub mod sink;
pub mod stats;
pub mod tokenizer;
pub mod worker;

pub use config::{ConfigError, IngestConfig};
pub use decoder::{DecodeError, Decoded, LineDecoder};
pub use metric::{FieldValue, Metric};
pub use pipeline::{IngestError, Pipeline};
pub use shutdown::Shutdown;
pub use sink::{JsonLinesSink, MetricSink};
pub use stats::StatsSnapshot;
pub use tokenizer::Tokenizer;
