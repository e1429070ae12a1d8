//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod schema_browser;
mod schema_paths;
mod schema_vendor;

pub use schema_browser::*;
pub use schema_paths::*;
pub use schema_vendor::*;

/// Shared default helper used by submodules.
pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    /// Per-vendor overrides and custom vendors, keyed by vendor id.
    #[serde(default)]
    pub vendors: BTreeMap<String, VendorConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Job execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Invoices considered per run when the request gives no limit.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound for the scan/download phase of one job.
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_seconds: u64,

    /// Interval between URL checks while waiting for manual login completion.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            scan_timeout_seconds: default_scan_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_limit() -> usize {
    10
}

fn default_scan_timeout() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    500
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
