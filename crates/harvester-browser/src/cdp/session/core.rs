//! Core session struct and CDP command dispatch.

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::cdp::client::CdpChannel;
use crate::cdp::error::CdpError;
use crate::cdp::protocol::{CdpEvent, ScreenshotFormat};

/// A session attached to a single page/target.
///
/// JavaScript dialogs (`alert`, `confirm`, `beforeunload`) are accepted
/// automatically so they can never stall an automation step.
pub struct PageSession {
    /// Target ID.
    pub(super) target_id: String,
    /// Session ID for this target.
    pub(super) session_id: String,
    /// Command channel (shared with client).
    pub(super) channel: CdpChannel,
    /// Background task consuming page events.
    event_pump: tokio::task::JoinHandle<()>,
}

impl PageSession {
    /// Create a new page session.
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        channel: CdpChannel,
        event_rx: mpsc::UnboundedReceiver<CdpEvent>,
    ) -> Self {
        let event_pump = tokio::spawn(Self::pump_events(
            channel.clone(),
            session_id.clone(),
            event_rx,
        ));

        Self {
            target_id,
            session_id,
            channel,
            event_pump,
        }
    }

    async fn pump_events(
        channel: CdpChannel,
        session_id: String,
        mut event_rx: mpsc::UnboundedReceiver<CdpEvent>,
    ) {
        while let Some(event) = event_rx.recv().await {
            match event.method.as_str() {
                "Page.javascriptDialogOpening" => {
                    debug!(
                        dialog = event.param_str("type").unwrap_or("unknown"),
                        "Accepting JavaScript dialog"
                    );
                    let result = channel
                        .call(
                            "Page.handleJavaScriptDialog",
                            Some(json!({"accept": true})),
                            Some(&session_id),
                        )
                        .await;
                    if let Err(e) = result {
                        warn!("Failed to dismiss dialog: {}", e);
                    }
                }
                "Inspector.detached" | "Target.detachedFromTarget" => break,
                other => trace!("Page event {}", other),
            }
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.channel
            .call(method, params, Some(&self.session_id))
            .await
    }

    /// Enable required CDP domains.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Set the viewport size for this page.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), CdpError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        Ok(())
    }

    /// Take a screenshot, returned base64 encoded.
    pub async fn screenshot(
        &self,
        format: ScreenshotFormat,
        full_page: bool,
    ) -> Result<String, CdpError> {
        let params = json!({
            "format": format,
            "captureBeyondViewport": full_page,
        });

        let result = self.call("Page.captureScreenshot", Some(params)).await?;

        result["data"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::Malformed("Missing screenshot data".to_string()))
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.event_pump.abort();
        self.channel.unsubscribe_session(&self.session_id);
    }
}
