// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wavefront Input CLI
//!
//! Listens for wavefront line protocol over TCP and writes the decoded
//! metrics to stdout as JSON lines.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port (2878)
//! wavefront-ingest
//!
//! # Custom address and queue size
//! wavefront-ingest --address 127.0.0.1:2879 --allowed-pending 50000
//!
//! # Using configuration file
//! wavefront-ingest --config wavefront.toml
//!
//! # Generate / check a configuration file
//! wavefront-ingest gen-config --output wavefront.toml
//! wavefront-ingest validate --config wavefront.toml
//! ```

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wavefront_ingest::{IngestConfig, JsonLinesSink, Pipeline, StatsSnapshot};

/// Wavefront line protocol input
#[derive(Parser, Debug)]
#[command(name = "wavefront-ingest")]
#[command(about = "Wavefront line protocol TCP input - decoded metrics as JSON lines")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long)]
    address: Option<String>,

    /// Capacity of the ingestion and output queues
    #[arg(long)]
    allowed_pending: Option<usize>,

    /// Maximum concurrently open connections (0 = unlimited)
    #[arg(long)]
    max_connections: Option<usize>,

    /// Drain interval (seconds)
    #[arg(long)]
    drain_interval: Option<u64>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "wavefront.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    // Initialize logging (stderr, stdout carries the metrics)
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let pipeline = Pipeline::new(config)?;
    let addr = pipeline.start().await?;

    eprintln!("Wavefront Input v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("=====================================");
    eprintln!("Listening on:    {}", addr);
    eprintln!("Allowed pending: {}", pipeline.config().allowed_pending);
    eprintln!("Drain interval:  {}s", pipeline.config().drain_interval_secs);
    eprintln!();
    eprintln!("Press Ctrl+C to stop...");
    eprintln!();

    let mut sink = JsonLinesSink::new(std::io::stdout().lock());
    let mut drain_tick = tokio::time::interval(pipeline.config().drain_interval());
    let stats_interval = pipeline.config().stats_interval_secs;
    let mut stats_tick = tokio::time::interval(Duration::from_secs(stats_interval.max(1)));

    loop {
        tokio::select! {
            _ = drain_tick.tick() => {
                drain(&pipeline, &mut sink);
            }
            _ = stats_tick.tick(), if stats_interval > 0 => {
                print_stats(&pipeline.stats());
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    eprintln!("\nShutting down...");
    pipeline.stop();
    drain(&pipeline, &mut sink);

    eprintln!("\nFinal Statistics:");
    print_stats(&pipeline.stats());

    Ok(())
}

fn drain<W: Write>(pipeline: &Pipeline, sink: &mut JsonLinesSink<W>) {
    let forwarded = pipeline.drain(sink);
    if let Err(e) = sink.flush() {
        warn!("Failed to flush output: {}", e);
    }
    if forwarded > 0 {
        info!("Drained {} metrics", forwarded);
    }
}

fn build_config(args: &Args) -> Result<IngestConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => IngestConfig::from_file(path)?,
        None => IngestConfig::default(),
    };

    // Command line overrides file values
    if let Some(address) = &args.address {
        config.address = address.clone();
    }
    if let Some(pending) = args.allowed_pending {
        config.allowed_pending = pending;
    }
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }
    if let Some(secs) = args.drain_interval {
        config.drain_interval_secs = secs;
    }
    if let Some(secs) = args.stats_interval {
        config.stats_interval_secs = secs;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(output, IngestConfig::sample())?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match IngestConfig::from_file(config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Address:         {}", config.address);
            match wavefront_ingest::config::resolve(&config.address) {
                Ok(addrs) => {
                    for addr in addrs {
                        println!("  resolves to    {}", addr);
                    }
                }
                Err(e) => println!("  (does not resolve here: {})", e),
            }
            println!("Allowed pending: {}", config.allowed_pending);
            println!(
                "Connections:     {}",
                if config.max_connections == 0 {
                    "unlimited".to_string()
                } else {
                    config.max_connections.to_string()
                }
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_stats(stats: &StatsSnapshot) {
    eprintln!("--- Input Statistics ---");
    eprintln!(
        "  lines: {} received ({:.1}/s), {} dropped, {} too long, {} undecodable",
        stats.lines_received,
        stats.lines_per_second(),
        stats.lines_dropped,
        stats.lines_too_long,
        stats.decode_failures
    );
    eprintln!(
        "  records: {} decoded, {} dropped, {} drained, {} tags skipped",
        stats.records_decoded, stats.records_dropped, stats.records_drained, stats.tags_skipped
    );
    eprintln!(
        "  connections: {} active, {} accepted, {} rejected",
        stats.connections_active, stats.connections_accepted, stats.connections_rejected
    );
}
