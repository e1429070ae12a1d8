//! Abstract page/context seams used by vendor automation.
//!
//! The CDP-backed implementations live in [`crate::manager`]; tests drive the
//! same traits with scripted fakes.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::launch::LaunchStrategy;
use crate::manager::BrowserError;
use crate::state::SessionState;

/// Interval used by [`Page::wait_for`].
pub const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A file produced by a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Name suggested by the server or browser.
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// One row of a listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRow {
    /// Visible text of the row.
    pub text: String,
    /// Absolute href of the row's invoice link, if it has one.
    pub href: Option<String>,
}

/// A single browser tab.
#[async_trait]
pub trait Page: Send + Sync {
    /// Stable identifier (CDP target id for real pages).
    fn id(&self) -> &str;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError>;

    /// Poll until `selector` matches. `Ok(false)` on timeout.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
        let start = Instant::now();
        loop {
            if self.exists(selector).await? {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    async fn press_key(&self, key: &str) -> Result<(), BrowserError>;

    /// Trimmed text of the first match, `None` if nothing matches.
    async fn text_of(&self, selector: &str) -> Result<Option<String>, BrowserError>;

    async fn attribute_of(&self, selector: &str, name: &str)
    -> Result<Option<String>, BrowserError>;

    /// Choose a `<select>` option by value or label.
    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Rows matching `row_selector`, in document order.
    async fn rows(
        &self,
        row_selector: &str,
        link_selector: &str,
    ) -> Result<Vec<ListingRow>, BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    async fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError>;

    /// Activate `trigger_selector` and return the file it produces.
    async fn download(
        &self,
        trigger_selector: &str,
        timeout: Duration,
    ) -> Result<DownloadedFile, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// An isolated cookie/storage jar bound to one profile.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    fn profile_id(&self) -> &str;

    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError>;

    /// Snapshot cookies and origin storage.
    async fn capture_state(&self) -> Result<SessionState, BrowserError>;

    /// Capture and persist through the session store.
    async fn persist_state(&self) -> Result<(), BrowserError>;
}

/// Per-acquisition overrides.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Replaces the configured strategy chain.
    pub strategies: Option<Vec<LaunchStrategy>>,
    /// Replaces the configured headless flag for launched browsers.
    pub headless: Option<bool>,
}

/// Hands out browser contexts keyed by profile.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Return the live context for `profile_id`, creating it if needed.
    async fn acquire_context(
        &self,
        profile_id: &str,
        options: &ContextOptions,
    ) -> Result<Arc<dyn BrowserContext>, BrowserError>;

    /// Flush state and release the context. No-op if not live.
    async fn close(&self, profile_id: &str) -> Result<(), BrowserError>;

    /// Close every live context.
    async fn shutdown(&self);

    /// Profiles with a live context.
    async fn live_profiles(&self) -> Vec<String>;
}

/// Save a PNG of `page` to `dest`. Failures are logged, never returned.
pub async fn capture_screenshot(page: &dyn Page, dest: &Path) -> bool {
    let bytes = match page.screenshot_png().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %dest.display(), "Screenshot failed: {}", e);
            return false;
        }
    };

    if let Some(parent) = dest.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %dest.display(), "Screenshot directory unavailable: {}", e);
            return false;
        }
    }

    match tokio::fs::write(dest, &bytes).await {
        Ok(()) => {
            debug!(path = %dest.display(), bytes = bytes.len(), "Saved screenshot");
            true
        }
        Err(e) => {
            warn!(path = %dest.display(), "Failed to write screenshot: {}", e);
            false
        }
    }
}

/// Extract the file name from a `Content-Disposition` header.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // RFC 5987: charset'lang'percent-encoded
                let encoded = value.rsplit('\'').next().unwrap_or(value);
                let decoded = url::form_urlencoded::parse(format!("v={}", encoded).as_bytes())
                    .next()
                    .map(|(_, v)| v.into_owned());
                if let Some(name) = decoded.filter(|n| !n.is_empty()) {
                    return Some(name);
                }
            }
            "filename" => {
                let name = value.trim().trim_matches('"').to_string();
                if !name.is_empty() {
                    plain = Some(name);
                }
            }
            _ => {}
        }
    }
    plain
}

/// Last path segment of a URL, if it looks like a file name.
pub fn filename_from_url(href: &str) -> Option<String> {
    let parsed = url::Url::parse(href).ok()?;
    let segment = parsed.path_segments()?.next_back()?.to_string();
    if segment.contains('.') {
        Some(segment)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_quoted() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="invoice 123.pdf""#),
            Some("invoice 123.pdf".to_string())
        );
    }

    #[test]
    fn test_disposition_prefers_extended() {
        let header = r#"attachment; filename="fallback.pdf"; filename*=UTF-8''Rechnung%20%C3%9C.pdf"#;
        assert_eq!(
            filename_from_disposition(header),
            Some("Rechnung Ü.pdf".to_string())
        );
    }

    #[test]
    fn test_disposition_without_name() {
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://x.test/docs/INV-1.pdf?sig=abc"),
            Some("INV-1.pdf".to_string())
        );
        assert_eq!(filename_from_url("https://x.test/invoice/123"), None);
        assert_eq!(filename_from_url("not a url"), None);
    }
}
