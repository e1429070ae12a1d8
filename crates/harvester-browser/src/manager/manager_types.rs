//! Browser manager type definitions and configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cdp::CdpError;
use crate::launch::{LaunchFailure, LaunchStrategy};
use crate::session_store::SessionStoreError;

/// Browser manager errors.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Browser not connected")]
    NotConnected,

    #[error("Browser context for '{0}' is closed")]
    ContextClosed(String),

    #[error("Chrome not found. Please install Google Chrome.")]
    ChromeNotFound,

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("All launch strategies failed: {}", format_failures(.0))]
    LaunchChainExhausted(Vec<LaunchFailure>),

    #[error("Invalid browser configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    SessionStore(#[from] SessionStoreError),
}

fn format_failures(failures: &[LaunchFailure]) -> String {
    if failures.is_empty() {
        return "no strategies configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::Unreachable(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::Navigation(msg) => BrowserError::NavigationFailed(msg),
            CdpError::NoSuchElement(msg) => BrowserError::ElementNotFound(msg),
            CdpError::Script(msg) => BrowserError::ActionFailed(format!("JS error: {}", msg)),
            CdpError::Timeout(msg) => BrowserError::Timeout(msg),
            CdpError::Closed => BrowserError::NotConnected,
            _ => BrowserError::ActionFailed(e.to_string()),
        }
    }
}

/// Lifecycle of one browser process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserState {
    Uninitialized,
    Launching,
    Ready,
    Closing,
    Closed,
}

/// Browser manager configuration.
#[derive(Debug, Clone)]
pub struct BrowserManagerConfig {
    /// Explicit Chrome executable; searched for when unset.
    pub chrome_path: Option<PathBuf>,
    /// Endpoint of an externally started browser.
    pub cdp_endpoint: String,
    /// Strategies tried in order.
    pub strategies: Vec<LaunchStrategy>,
    /// Parent of the per-profile user data directories.
    pub profiles_dir: PathBuf,
    /// Parent of the per-profile in-flight download directories.
    pub downloads_dir: PathBuf,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How long a spawned Chrome may take to expose its debugging port.
    pub launch_timeout: Duration,
}

impl Default for BrowserManagerConfig {
    fn default() -> Self {
        let base = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".invoice-harvester");
        Self {
            chrome_path: None,
            cdp_endpoint: "http://127.0.0.1:9222".to_string(),
            strategies: LaunchStrategy::ALL.to_vec(),
            profiles_dir: base.join("profiles"),
            downloads_dir: base.join("tmp").join("downloads"),
            headless: false,
            viewport_width: 1280,
            viewport_height: 900,
            launch_timeout: Duration::from_secs(15),
        }
    }
}
