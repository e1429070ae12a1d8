//! CDP-backed [`Page`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::cdp::{CdpClient, PageSession, ScreenshotFormat};
use crate::page::{filename_from_disposition, filename_from_url, DownloadedFile, ListingRow, Page};

use super::BrowserError;

const FETCH_DOWNLOAD_SCRIPT: &str = "\
    if (!el) return { missing: true }; \
    const href = el.href || el.getAttribute('href'); \
    if (!href || href.startsWith('javascript:') || href.endsWith('#')) return { href: null }; \
    const resp = await fetch(href, { credentials: 'include' }); \
    const type = resp.headers.get('content-type') || ''; \
    if (!resp.ok || type.includes('text/html')) return { href, status: resp.status }; \
    const buf = new Uint8Array(await resp.arrayBuffer()); \
    let bin = ''; \
    for (let i = 0; i < buf.length; i += 0x8000) { \
      bin += String.fromCharCode.apply(null, buf.subarray(i, i + 0x8000)); \
    } \
    return { href, data: btoa(bin), contentType: type, \
             disposition: resp.headers.get('content-disposition') };";

/// A tab attached over CDP.
pub struct CdpPage {
    pub(super) session: PageSession,
    client: Arc<CdpClient>,
    download_dir: PathBuf,
    closed: AtomicBool,
}

impl CdpPage {
    pub(super) fn new(session: PageSession, client: Arc<CdpClient>, download_dir: PathBuf) -> Self {
        Self {
            session,
            client,
            download_dir,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fetch a link target from inside the page so cookies apply.
    ///
    /// `Ok(None)` when the trigger is not a fetchable link.
    async fn fetch_link(&self, selector: &str) -> Result<Option<DownloadedFile>, BrowserError> {
        let result = match self
            .session
            .evaluate_on_selector(selector, FETCH_DOWNLOAD_SCRIPT, Value::Null)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                debug!("In-page fetch unavailable, falling back to click: {}", e);
                return Ok(None);
            }
        };

        if result["missing"].as_bool().unwrap_or(false) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        let Some(data) = result["data"].as_str() else {
            return Ok(None);
        };

        let bytes = STANDARD
            .decode(data)
            .map_err(|e| BrowserError::DownloadFailed(format!("bad payload: {}", e)))?;
        let href = result["href"].as_str().unwrap_or_default();
        let file_name = result["disposition"]
            .as_str()
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(href))
            .unwrap_or_else(|| "download".to_string());
        let content_type = result["contentType"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string());

        debug!(file = %file_name, bytes = bytes.len(), "Fetched link target");
        Ok(Some(DownloadedFile {
            file_name,
            content_type,
            bytes,
        }))
    }

    /// Click the trigger and wait for the browser download to finish.
    async fn click_download(&self, selector: &str) -> Result<DownloadedFile, BrowserError> {
        let mut events = self.client.subscribe_browser_events();
        self.session.click_selector(selector).await?;

        let target_id = self.session.target_id();
        let mut guid: Option<String> = None;
        let mut suggested: Option<String> = None;

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed browser events while waiting for download");
                    continue;
                }
                Err(RecvError::Closed) => return Err(BrowserError::NotConnected),
            };

            match event.method.as_str() {
                "Browser.downloadWillBegin" if guid.is_none() => {
                    if event.param_str("frameId").is_some_and(|f| f != target_id) {
                        continue;
                    }
                    guid = event.param_str("guid").map(|s| s.to_string());
                    suggested = event.param_str("suggestedFilename").map(|s| s.to_string());
                    debug!(guid = ?guid, file = ?suggested, "Download started");
                }
                "Browser.downloadProgress" if guid.is_some() => {
                    if event.param_str("guid") != guid.as_deref() {
                        continue;
                    }
                    match event.param_str("state") {
                        Some("completed") => break,
                        Some("canceled") => {
                            return Err(BrowserError::DownloadFailed("download canceled".to_string()));
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let guid = guid.unwrap_or_default();
        let path = self.download_dir.join(&guid);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| BrowserError::DownloadFailed(format!("{}: {}", path.display(), e)))?;
        let _ = tokio::fs::remove_file(&path).await;

        Ok(DownloadedFile {
            file_name: suggested.unwrap_or(guid),
            content_type: None,
            bytes,
        })
    }
}

#[async_trait]
impl Page for CdpPage {
    fn id(&self) -> &str {
        self.session.target_id()
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.session.navigate(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.session.get_url().await?)
    }

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.session.query_selector(selector).await?.is_some())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        Ok(self.session.fill(selector, value).await?)
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        Ok(self.session.click_selector(selector).await?)
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        Ok(self.session.press_key(key).await?)
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.session.text_of(selector).await?)
    }

    async fn attribute_of(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        Ok(self.session.attribute_of(selector, name).await?)
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        Ok(self.session.select_option(selector, value).await?)
    }

    async fn rows(
        &self,
        row_selector: &str,
        link_selector: &str,
    ) -> Result<Vec<ListingRow>, BrowserError> {
        let expression = format!(
            "(() => Array.from(document.querySelectorAll({rows})).map(row => {{ \
               const link = row.matches({link}) ? row : row.querySelector({link}); \
               const href = link ? (link.href || link.getAttribute('href')) : null; \
               return {{ text: (row.innerText || '').trim(), href: href || null }}; \
             }}))()",
            rows = serde_json::to_string(row_selector)
                .map_err(|e| BrowserError::ActionFailed(e.to_string()))?,
            link = serde_json::to_string(link_selector)
                .map_err(|e| BrowserError::ActionFailed(e.to_string()))?,
        );
        let value = self.session.evaluate(&expression).await?;
        serde_json::from_value(value)
            .map_err(|e| BrowserError::ActionFailed(format!("unexpected row data: {}", e)))
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        Ok(self.session.evaluate(script).await?)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        let data = self
            .session
            .screenshot(ScreenshotFormat::Png, true)
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))?;
        STANDARD
            .decode(data)
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))
    }

    async fn download(
        &self,
        trigger_selector: &str,
        timeout: Duration,
    ) -> Result<DownloadedFile, BrowserError> {
        let attempt = async {
            if let Some(file) = self.fetch_link(trigger_selector).await? {
                return Ok(file);
            }
            self.click_download(trigger_selector).await
        };

        tokio::time::timeout(timeout, attempt).await.map_err(|_| {
            BrowserError::Timeout(format!(
                "download via '{}' exceeded {}s",
                trigger_selector,
                timeout.as_secs()
            ))
        })?
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.client.close_page(self.session.target_id()).await {
            Ok(()) => Ok(()),
            // Already gone with its context.
            Err(e) => {
                debug!("Closing page {}: {}", self.session.target_id(), e);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for CdpPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpPage")
            .field("target_id", &self.session.target_id())
            .field("closed", &self.is_closed())
            .finish()
    }
}
