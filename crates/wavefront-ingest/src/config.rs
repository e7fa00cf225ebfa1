// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Input configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use serde::{Deserialize, Serialize};
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default listen address (standard wavefront proxy port).
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:2878";

/// Default capacity of each pipeline queue.
pub const DEFAULT_ALLOWED_PENDING: usize = 10_000;

/// Default maximum line length in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Wavefront input configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Listen address (`host:port`).
    #[serde(default = "default_address")]
    pub address: String,

    /// Capacity of the ingestion queue and of the output queue.
    #[serde(default = "default_allowed_pending")]
    pub allowed_pending: usize,

    /// Maximum concurrently open connections (0 = unlimited).
    #[serde(default)]
    pub max_connections: usize,

    /// Maximum accepted line length in bytes.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Drain interval of the command-line host (seconds).
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    /// Statistics reporting interval (seconds, 0 to disable).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_allowed_pending() -> usize {
    DEFAULT_ALLOWED_PENDING
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_drain_interval() -> u64 {
    10
}

fn default_stats_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            allowed_pending: default_allowed_pending(),
            max_connections: 0,
            max_line_length: default_max_line_length(),
            drain_interval_secs: default_drain_interval(),
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
        }
    }
}

impl IngestConfig {
    /// Configuration listening on `address`, everything else default.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Drain interval as Duration.
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("address cannot be empty".into()));
        }
        // Only the shape is checked here; resolution happens at bind time.
        if !has_port(&self.address) {
            return Err(ConfigError::Invalid(format!(
                "address {:?} must be host:port",
                self.address
            )));
        }
        if self.allowed_pending == 0 {
            return Err(ConfigError::Invalid(
                "allowed_pending cannot be 0".into(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "max_line_length cannot be 0".into(),
            ));
        }
        if self.drain_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "drain_interval_secs cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Commented sample configuration.
    pub fn sample() -> String {
        format!(
            r#"# Wavefront input configuration

## Address to listen on (host:port)
address = "{address}"

## Capacity of the ingestion and output queues. Lines arriving while a
## queue is full are dropped and counted.
allowed_pending = {pending}

## Maximum concurrently open connections (0 = unlimited)
max_connections = 0

## Lines longer than this many bytes are discarded
max_line_length = {max_line}

## How often decoded metrics are drained (seconds)
drain_interval_secs = {drain}

## Statistics report interval (seconds, 0 to disable)
stats_interval_secs = {stats}

log_level = "info"
"#,
            address = DEFAULT_ADDRESS,
            pending = DEFAULT_ALLOWED_PENDING,
            max_line = DEFAULT_MAX_LINE_LENGTH,
            drain = default_drain_interval(),
            stats = default_stats_interval(),
        )
    }
}

fn has_port(address: &str) -> bool {
    if address.parse::<std::net::SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Resolve `address` to socket addresses.
pub fn resolve(address: &str) -> Result<Vec<std::net::SocketAddr>, ConfigError> {
    let addrs: Vec<_> = address.to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "address {:?} did not resolve",
            address
        )));
    }
    Ok(addrs)
}
