//! Configuration for the orchestrator.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Provider gateway URL.
    pub provider_url: String,

    /// Cluster manifest (TOML).
    pub cluster_file: PathBuf,

    /// Directory holding private keys for managed key pairs.
    pub key_dir: PathBuf,

    /// Deadline for each remote command and for node readiness.
    pub command_timeout: Duration,

    /// First poll delay; later polls back off from here.
    pub poll_interval: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider_url = lookup("FLEET_PROVIDER_URL")
            .unwrap_or_else(|| "http://127.0.0.1:4566".to_string());

        let cluster_file = lookup("FLEET_CLUSTER_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cluster.toml"));

        let key_dir = lookup("FLEET_KEY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_key_dir);

        let command_timeout_secs: u64 = parse_or(&lookup, "FLEET_COMMAND_TIMEOUT_SECS", 600)?;
        let poll_interval_ms: u64 = parse_or(&lookup, "FLEET_POLL_INTERVAL_MS", 1000)?;

        let log_level = lookup("FLEET_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            provider_url,
            cluster_file,
            key_dir,
            command_timeout: Duration::from_secs(command_timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
            log_level,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn default_key_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".ssh"))
        .unwrap_or_else(|| PathBuf::from(".ssh"))
}
