//! CDP WebSocket client.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use super::error::CdpError;
use super::protocol::{
    BrowserVersion, CdpEvent, CdpRequest, CdpResponse, CookieParam, NetworkCookie,
};
use super::session::PageSession;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type EventHandlers = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<CdpEvent>>>>;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const BROWSER_EVENT_CAPACITY: usize = 256;

/// Pending request waiting for response.
struct PendingRequest {
    tx: oneshot::Sender<Result<Value, CdpError>>,
}

/// Command channel shared by the client and every page session on it.
#[derive(Clone)]
pub(crate) struct CdpChannel {
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    request_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    handlers: EventHandlers,
}

impl CdpChannel {
    /// Send a CDP command and wait for its response.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::Closed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    /// Route events for `session_id` into a fresh receiver.
    pub(crate) fn subscribe_session(&self, session_id: &str) -> mpsc::UnboundedReceiver<CdpEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.handlers.write().insert(session_id.to_string(), tx);
        rx
    }

    pub(crate) fn unsubscribe_session(&self, session_id: &str) {
        self.handlers.write().remove(session_id);
    }
}

/// CDP client for one browser process.
///
/// Owns the browser-level WebSocket; page sessions share its command channel.
pub struct CdpClient {
    /// HTTP endpoint used for discovery.
    http_endpoint: String,
    /// Browser WebSocket URL.
    browser_ws_url: String,
    /// Browser product string from `/json/version`.
    product: String,
    channel: CdpChannel,
    /// Browser-level events (downloads, target lifecycle).
    browser_events: broadcast::Sender<CdpEvent>,
    connected: Arc<AtomicBool>,
    /// Background task handle.
    _recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome at the given endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Chrome debugging endpoint (e.g., "http://127.0.0.1:9222")
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/').to_string();

        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        let version: BrowserVersion = http
            .get(&version_url)
            .send()
            .await
            .map_err(|e| CdpError::Unreachable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::Unreachable(format!("{}: {}", endpoint, e)))?;

        let browser_ws_url = version.web_socket_debugger_url;

        let (ws_stream, _) = tokio_tungstenite::connect_async(browser_ws_url.as_str())
            .await
            .map_err(|e| CdpError::Unreachable(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let channel = CdpChannel {
            ws_tx: Arc::new(tokio::sync::Mutex::new(ws_sink)),
            request_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
        };
        let (browser_events, _) = broadcast::channel(BROWSER_EVENT_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));

        let recv_task = {
            let pending = channel.pending.clone();
            let handlers = channel.handlers.clone();
            let browser_events = browser_events.clone();
            let connected = connected.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, pending, handlers, browser_events).await;
                connected.store(false, Ordering::SeqCst);
            })
        };

        debug!("CDP client connected to {} ({})", browser_ws_url, version.browser);

        Ok(Self {
            http_endpoint,
            browser_ws_url,
            product: version.browser,
            channel,
            browser_events,
            connected,
            _recv_task: recv_task,
        })
    }

    /// WebSocket receive loop.
    async fn receive_loop(
        mut ws_source: WsSource,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        handlers: EventHandlers,
        browser_events: broadcast::Sender<CdpEvent>,
    ) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    let resp = match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => resp,
                        Err(e) => {
                            warn!("Failed to parse CDP message: {}", e);
                            continue;
                        }
                    };

                    if let Some(id) = resp.id {
                        let pending_req = pending.lock().remove(&id);
                        if let Some(req) = pending_req {
                            let result = match resp.error {
                                Some(error) => Err(CdpError::Remote {
                                    code: error.code,
                                    message: error.message,
                                }),
                                None => Ok(resp.result.unwrap_or(Value::Null)),
                            };
                            let _ = req.tx.send(result);
                        }
                    } else if let Some(event) = CdpEvent::from_response(resp) {
                        if event.session_id.is_empty() {
                            let _ = browser_events.send(event);
                        } else if let Some(tx) = handlers.read().get(&event.session_id) {
                            let _ = tx.send(event);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        // Dropping the senders fails every in-flight call with SessionClosed.
        pending.lock().clear();
        handlers.write().clear();
    }

    /// Send a browser-level CDP command.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.channel.call(method, params, None).await
    }

    /// Whether the WebSocket is still open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Get browser WebSocket URL.
    pub fn browser_ws_url(&self) -> &str {
        &self.browser_ws_url
    }

    /// HTTP endpoint the client was discovered through.
    pub fn http_endpoint(&self) -> &str {
        &self.http_endpoint
    }

    /// Browser product string, e.g. `Chrome/126.0.6478.126`.
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Subscribe to browser-level events.
    pub fn subscribe_browser_events(&self) -> broadcast::Receiver<CdpEvent> {
        self.browser_events.subscribe()
    }

    // ========================================================================
    // Browser contexts
    // ========================================================================

    /// Create an isolated (incognito-like) browser context.
    pub async fn create_browser_context(&self) -> Result<String, CdpError> {
        let result = self
            .call(
                "Target.createBrowserContext",
                Some(json!({"disposeOnDetach": true})),
            )
            .await?;

        result["browserContextId"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::Malformed("Missing browserContextId".to_string()))
    }

    /// Dispose a browser context and every page inside it.
    pub async fn dispose_browser_context(&self, context_id: &str) -> Result<(), CdpError> {
        self.call(
            "Target.disposeBrowserContext",
            Some(json!({"browserContextId": context_id})),
        )
        .await?;
        Ok(())
    }

    /// Route downloads of a context (or the default context) into `dir`.
    ///
    /// Files are saved under their download GUID; progress is reported
    /// through `Browser.downloadWillBegin` / `Browser.downloadProgress`.
    pub async fn set_download_behavior(
        &self,
        context_id: Option<&str>,
        dir: &Path,
    ) -> Result<(), CdpError> {
        let mut params = json!({
            "behavior": "allowAndName",
            "downloadPath": dir.to_string_lossy(),
            "eventsEnabled": true,
        });
        if let Some(id) = context_id {
            params["browserContextId"] = json!(id);
        }
        self.call("Browser.setDownloadBehavior", Some(params)).await?;
        Ok(())
    }

    /// Read every cookie of a context.
    pub async fn get_cookies(
        &self,
        context_id: Option<&str>,
    ) -> Result<Vec<NetworkCookie>, CdpError> {
        let params = context_id.map(|id| json!({"browserContextId": id}));
        let result = self.call("Storage.getCookies", params).await?;
        let cookies: Vec<NetworkCookie> = serde_json::from_value(result["cookies"].clone())?;
        Ok(cookies)
    }

    /// Install cookies into a context.
    pub async fn set_cookies(
        &self,
        context_id: Option<&str>,
        cookies: &[CookieParam],
    ) -> Result<(), CdpError> {
        if cookies.is_empty() {
            return Ok(());
        }
        let mut params = json!({"cookies": cookies});
        if let Some(id) = context_id {
            params["browserContextId"] = json!(id);
        }
        self.call("Storage.setCookies", Some(params)).await?;
        Ok(())
    }

    // ========================================================================
    // Target Management
    // ========================================================================

    /// Open a blank page, optionally inside a browser context.
    pub async fn new_page(&self, context_id: Option<&str>) -> Result<PageSession, CdpError> {
        let mut params = json!({"url": "about:blank"});
        if let Some(id) = context_id {
            params["browserContextId"] = json!(id);
        }
        let result = self.call("Target.createTarget", Some(params)).await?;
        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::Malformed("Missing targetId".to_string()))?
            .to_string();

        debug!("Created new page: {}", target_id);
        self.attach_page(&target_id).await
    }

    /// Attach to an existing page.
    pub async fn attach_page(&self, target_id: &str) -> Result<PageSession, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::Malformed("Missing sessionId".to_string()))?
            .to_string();

        let event_rx = self.channel.subscribe_session(&session_id);
        let session = PageSession::new(
            target_id.to_string(),
            session_id,
            self.channel.clone(),
            event_rx,
        );

        session.enable_domains().await?;

        Ok(session)
    }

    /// Close a page/target.
    pub async fn close_page(&self, target_id: &str) -> Result<(), CdpError> {
        self.call("Target.closeTarget", Some(json!({"targetId": target_id})))
            .await?;
        Ok(())
    }

    /// Ask the browser to exit.
    pub async fn close_browser(&self) -> Result<(), CdpError> {
        match self.call("Browser.close", None).await {
            // The socket usually drops before the reply arrives.
            Ok(_) | Err(CdpError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._recv_task.abort();
    }
}
