//! Browser launch strategies and the fallback chain.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::cdp::CdpClient;
use crate::manager::{BrowserError, BrowserManagerConfig};
use crate::session_store::sanitize_id;

const PORT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const MANAGED_PROFILE_DIR: &str = ".managed";

/// One way of obtaining a CDP-connected browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStrategy {
    /// Dedicated Chrome on a per-profile user data directory.
    PersistentProfile,
    /// An already running browser reachable at the configured endpoint.
    SystemCdp,
    /// Chrome on a scratch directory owned by the manager.
    Managed,
}

impl LaunchStrategy {
    pub const ALL: [LaunchStrategy; 3] = [
        LaunchStrategy::PersistentProfile,
        LaunchStrategy::SystemCdp,
        LaunchStrategy::Managed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchStrategy::PersistentProfile => "persistent_profile",
            LaunchStrategy::SystemCdp => "system_cdp",
            LaunchStrategy::Managed => "managed",
        }
    }

    /// Key of the browser process serving `profile_id` under this strategy.
    pub fn browser_key(&self, profile_id: &str) -> String {
        match self {
            LaunchStrategy::PersistentProfile => format!("profile:{}", profile_id),
            LaunchStrategy::SystemCdp => "system".to_string(),
            LaunchStrategy::Managed => "managed".to_string(),
        }
    }

    /// Shared browsers get one isolated browser context per profile.
    pub fn isolates_context(&self) -> bool {
        !matches!(self, LaunchStrategy::PersistentProfile)
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchStrategy {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "persistent_profile" | "persistent" => Ok(LaunchStrategy::PersistentProfile),
            "system_cdp" | "system" | "cdp" => Ok(LaunchStrategy::SystemCdp),
            "managed" => Ok(LaunchStrategy::Managed),
            other => Err(BrowserError::InvalidConfig(format!(
                "unknown launch strategy '{}'",
                other
            ))),
        }
    }
}

/// A strategy that failed, with its error rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchFailure {
    pub strategy: LaunchStrategy,
    pub error: String,
}

impl fmt::Display for LaunchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// A freshly connected browser.
pub struct LaunchedBrowser {
    pub client: CdpClient,
    /// Present when the manager spawned the process.
    pub process: Option<Child>,
}

/// Try `strategies` in order and return the first success.
///
/// Every failure is logged; if all fail the error carries each of them.
pub async fn run_chain<T, F, Fut>(
    strategies: &[LaunchStrategy],
    mut attempt: F,
) -> Result<(LaunchStrategy, T), BrowserError>
where
    F: FnMut(LaunchStrategy) -> Fut,
    Fut: Future<Output = Result<T, BrowserError>>,
{
    let mut failures = Vec::with_capacity(strategies.len());

    for &strategy in strategies {
        debug!(strategy = %strategy, "Trying launch strategy");
        match attempt(strategy).await {
            Ok(value) => return Ok((strategy, value)),
            Err(e) => {
                warn!(strategy = %strategy, "Launch strategy failed: {}", e);
                failures.push(LaunchFailure {
                    strategy,
                    error: e.to_string(),
                });
            }
        }
    }

    Err(BrowserError::LaunchChainExhausted(failures))
}

/// Obtain a browser with one strategy.
pub async fn launch(
    strategy: LaunchStrategy,
    profile_id: &str,
    config: &BrowserManagerConfig,
    headless: bool,
) -> Result<LaunchedBrowser, BrowserError> {
    match strategy {
        LaunchStrategy::PersistentProfile => {
            let dir = config.profiles_dir.join(sanitize_id(profile_id));
            spawn_and_connect(config, &dir, headless).await
        }
        LaunchStrategy::SystemCdp => {
            let client = CdpClient::connect(&config.cdp_endpoint).await?;
            info!(endpoint = %config.cdp_endpoint, browser = client.product(), "Attached to running browser");
            Ok(LaunchedBrowser {
                client,
                process: None,
            })
        }
        LaunchStrategy::Managed => {
            let dir = config.profiles_dir.join(MANAGED_PROFILE_DIR);
            spawn_and_connect(config, &dir, headless).await
        }
    }
}

/// Resolve the Chrome executable.
///
/// An explicitly configured path must exist; otherwise `CHROME_PATH` and the
/// usual install locations are searched.
pub fn find_chrome(configured: Option<&Path>) -> Result<PathBuf, BrowserError> {
    if let Some(path) = configured {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(BrowserError::LaunchFailed(format!(
                "Chrome executable not found at {}",
                path.display()
            )))
        };
    }

    if let Ok(env_path) = std::env::var("CHROME_PATH") {
        let p = PathBuf::from(env_path);
        if p.exists() {
            return Ok(p);
        }
    }

    #[cfg(target_os = "macos")]
    let candidates: &[&str] = &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ];

    #[cfg(target_os = "windows")]
    let candidates: &[&str] = &[
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ];

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let candidates: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(BrowserError::ChromeNotFound)
}

/// Parse the port from a `DevToolsActivePort` file.
pub fn parse_devtools_active_port(content: &str) -> Option<u16> {
    content.lines().next()?.trim().parse().ok()
}

async fn spawn_and_connect(
    config: &BrowserManagerConfig,
    user_data_dir: &Path,
    headless: bool,
) -> Result<LaunchedBrowser, BrowserError> {
    let chrome_path = find_chrome(config.chrome_path.as_deref())?;

    tokio::fs::create_dir_all(user_data_dir)
        .await
        .map_err(|e| BrowserError::LaunchFailed(format!("{}: {}", user_data_dir.display(), e)))?;

    // A stale port file from a previous run would point at a dead process.
    let port_file = user_data_dir.join("DevToolsActivePort");
    let _ = tokio::fs::remove_file(&port_file).await;

    info!(
        chrome = %chrome_path.display(),
        profile_dir = %user_data_dir.display(),
        headless,
        "Launching Chrome"
    );

    let mut cmd = Command::new(&chrome_path);
    cmd.arg("--remote-debugging-port=0")
        .arg(format!("--user-data-dir={}", user_data_dir.display()))
        .arg(format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--disable-popup-blocking")
        .arg("--metrics-recording-only")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    if headless {
        cmd.arg("--headless=new");
    }
    cmd.arg("about:blank");

    let mut child = cmd
        .spawn()
        .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
    debug!("Chrome launched with PID: {:?}", child.id());

    let port = match wait_for_port(&port_file, &mut child, config.launch_timeout).await {
        Ok(port) => port,
        Err(e) => {
            let _ = child.kill().await;
            return Err(e);
        }
    };

    let endpoint = format!("http://127.0.0.1:{}", port);
    match CdpClient::connect(&endpoint).await {
        Ok(client) => {
            info!(endpoint = %endpoint, browser = client.product(), "Connected to launched Chrome");
            Ok(LaunchedBrowser {
                client,
                process: Some(child),
            })
        }
        Err(e) => {
            let _ = child.kill().await;
            Err(e.into())
        }
    }
}

async fn wait_for_port(
    port_file: &Path,
    child: &mut Child,
    timeout: Duration,
) -> Result<u16, BrowserError> {
    let start = Instant::now();
    loop {
        if let Ok(content) = tokio::fs::read_to_string(port_file).await {
            if let Some(port) = parse_devtools_active_port(&content) {
                return Ok(port);
            }
        }

        // Chrome hands off to an existing instance on the same profile and exits.
        if let Ok(Some(status)) = child.try_wait() {
            return Err(BrowserError::LaunchFailed(format!(
                "Chrome exited early ({}); is the profile already in use?",
                status
            )));
        }

        if start.elapsed() >= timeout {
            return Err(BrowserError::LaunchFailed(format!(
                "Chrome did not report a debugging port within {}s",
                timeout.as_secs()
            )));
        }

        tokio::time::sleep(PORT_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
#[path = "launch_tests.rs"]
mod tests;
