//! Browser launch policy.

use serde::{Deserialize, Serialize};

/// Launch strategy names understood by the browser manager.
pub const KNOWN_STRATEGIES: [&str; 3] = ["persistent_profile", "system_cdp", "managed"];

/// Browser configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run launched browsers without a window.
    #[serde(default)]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Debugging endpoint of an already running system browser.
    #[serde(default = "default_cdp_endpoint")]
    pub cdp_endpoint: String,

    /// Launch strategies, tried in order.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Seconds to wait for a launched browser to expose its debugging port.
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_seconds: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            cdp_endpoint: default_cdp_endpoint(),
            strategies: default_strategies(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            launch_timeout_seconds: default_launch_timeout(),
        }
    }
}

fn default_cdp_endpoint() -> String {
    "http://127.0.0.1:9222".to_string()
}

fn default_strategies() -> Vec<String> {
    KNOWN_STRATEGIES.iter().map(|s| s.to_string()).collect()
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    900
}

fn default_launch_timeout() -> u64 {
    15
}
