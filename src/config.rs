// src/config.rs

//! Loads and validates the handler's process-level configuration: topology
//! (disk/stripe counts), default timeouts, logging, and the status endpoint.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// The fully resolved, validated configuration for one handler process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of independent backing disks the handler routes work across.
    #[serde(default = "default_num_disks")]
    pub num_disks: usize,
    /// Dispatch stripes (independent lock/queue shards) per disk.
    #[serde(default = "default_stripes_per_disk")]
    pub stripes_per_disk: usize,
    /// Default timeout applied to `getNextMessage` calls that don't specify
    /// their own, in milliseconds.
    #[serde(default = "default_next_message_timeout_ms")]
    pub next_message_timeout_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bind address for the status/metrics HTTP endpoint.
    #[serde(default = "default_status_bind_addr")]
    pub status_bind_addr: String,
}

fn default_num_disks() -> usize {
    4
}
fn default_stripes_per_disk() -> usize {
    16
}
fn default_next_message_timeout_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_status_bind_addr() -> String {
    "0.0.0.0:8878".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_disks: default_num_disks(),
            stripes_per_disk: default_stripes_per_disk(),
            next_message_timeout_ms: default_next_message_timeout_ms(),
            log_level: default_log_level(),
            status_bind_addr: default_status_bind_addr(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// any field the file omits, then validates the result.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.num_disks == 0 {
            return Err(anyhow!("num_disks cannot be 0"));
        }
        if self.stripes_per_disk == 0 {
            return Err(anyhow!("stripes_per_disk cannot be 0"));
        }
        if self.next_message_timeout_ms == 0 {
            return Err(anyhow!("next_message_timeout_ms cannot be 0"));
        }
        self.status_bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow!("invalid status_bind_addr '{}': {e}", self.status_bind_addr))?;
        Ok(())
    }

    pub fn next_message_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.next_message_timeout_ms)
    }
}
