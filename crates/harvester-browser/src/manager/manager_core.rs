//! BrowserManager core: browser handles, context acquisition and teardown.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cdp::{CdpClient, CookieParam};
use crate::launch::{self, LaunchStrategy, LaunchedBrowser};
use crate::page::{BrowserContext, ContextOptions, ContextProvider};
use crate::session_store::{sanitize_id, SessionStore};
use crate::state::SessionState;

use super::cdp_context::{CdpContext, ContextParts};
use super::{BrowserError, BrowserManagerConfig, BrowserState};

const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected browser process shared by one or more contexts.
struct BrowserHandle {
    key: String,
    client: Arc<CdpClient>,
    /// Present when the manager spawned the process.
    process: Option<Child>,
    state: BrowserState,
    attached: usize,
}

impl BrowserHandle {
    fn new(key: String, launched: LaunchedBrowser) -> Self {
        let mut handle = Self {
            key,
            client: Arc::new(launched.client),
            process: launched.process,
            state: BrowserState::Launching,
            attached: 0,
        };
        handle.transition(BrowserState::Ready);
        handle
    }

    fn transition(&mut self, next: BrowserState) {
        debug!(browser = %self.key, from = ?self.state, to = ?next, "Browser state change");
        self.state = next;
    }

    fn is_ready(&self) -> bool {
        self.state == BrowserState::Ready && self.client.is_connected()
    }

    async fn shutdown(&mut self) {
        self.transition(BrowserState::Closing);

        if let Some(mut child) = self.process.take() {
            if let Err(e) = self.client.close_browser().await {
                debug!(browser = %self.key, "Browser.close failed: {}", e);
            }
            match tokio::time::timeout(GRACEFUL_EXIT_TIMEOUT, child.wait()).await {
                Ok(_) => debug!(browser = %self.key, "Chrome exited"),
                Err(_) => {
                    warn!(browser = %self.key, "Chrome did not exit, killing");
                    let _ = child.kill().await;
                }
            }
        }

        self.transition(BrowserState::Closed);
        info!(browser = %self.key, "Browser released");
    }
}

#[derive(Default)]
struct ManagerState {
    browsers: HashMap<String, BrowserHandle>,
    contexts: HashMap<String, Arc<CdpContext>>,
}

/// Launches browsers through the strategy chain and owns every live context.
///
/// All lifecycle operations are serialised behind one async mutex.
pub struct BrowserManager {
    config: BrowserManagerConfig,
    store: Arc<dyn SessionStore>,
    state: Mutex<ManagerState>,
}

impl BrowserManager {
    /// Create a new browser manager.
    pub fn new(config: BrowserManagerConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            store,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn config(&self) -> &BrowserManagerConfig {
        &self.config
    }

    /// State of the browser serving `profile_id`.
    pub async fn browser_state(&self, profile_id: &str) -> BrowserState {
        let state = self.state.lock().await;
        state
            .contexts
            .get(profile_id)
            .and_then(|ctx| state.browsers.get(&ctx.browser_key()))
            .map(|h| h.state)
            .unwrap_or(BrowserState::Uninitialized)
    }

    async fn load_state(&self, profile_id: &str) -> SessionState {
        match self.store.load(profile_id).await {
            Ok(Some(state)) => state,
            Ok(None) => SessionState::default(),
            Err(e) => {
                warn!(profile = profile_id, "Ignoring unreadable session state: {}", e);
                SessionState::default()
            }
        }
    }

    async fn open_context(
        &self,
        profile_id: &str,
        strategy: LaunchStrategy,
        client: Arc<CdpClient>,
        baseline: SessionState,
    ) -> Result<Arc<CdpContext>, BrowserError> {
        let browser_context_id = if strategy.isolates_context() {
            Some(client.create_browser_context().await?)
        } else {
            None
        };

        let configured = self
            .configure_context(profile_id, &client, browser_context_id.as_deref(), &baseline)
            .await;

        let download_dir = match configured {
            Ok(dir) => dir,
            Err(e) => {
                if let Some(id) = &browser_context_id {
                    let _ = client.dispose_browser_context(id).await;
                }
                return Err(e);
            }
        };

        Ok(Arc::new(CdpContext::new(ContextParts {
            profile_id: profile_id.to_string(),
            strategy,
            client,
            browser_context_id,
            download_dir,
            viewport: (self.config.viewport_width, self.config.viewport_height),
            store: self.store.clone(),
            baseline,
        })))
    }

    async fn configure_context(
        &self,
        profile_id: &str,
        client: &CdpClient,
        context_id: Option<&str>,
        baseline: &SessionState,
    ) -> Result<std::path::PathBuf, BrowserError> {
        let download_dir = self.config.downloads_dir.join(sanitize_id(profile_id));
        tokio::fs::create_dir_all(&download_dir).await.map_err(|e| {
            BrowserError::ActionFailed(format!("{}: {}", download_dir.display(), e))
        })?;
        client.set_download_behavior(context_id, &download_dir).await?;

        if !baseline.cookies.is_empty() {
            let cookies: Vec<CookieParam> = baseline.cookies.iter().map(CookieParam::from).collect();
            match client.set_cookies(context_id, &cookies).await {
                Ok(()) => debug!(profile = profile_id, count = cookies.len(), "Restored cookies"),
                Err(e) => warn!(profile = profile_id, "Failed to restore cookies: {}", e),
            }
        }

        Ok(download_dir)
    }

    /// Drop one context reference from a browser; shut it down at zero.
    async fn release_browser(state: &mut ManagerState, key: &str) {
        let Some(handle) = state.browsers.get_mut(key) else {
            return;
        };
        handle.attached = handle.attached.saturating_sub(1);
        if handle.attached > 0 {
            return;
        }
        if let Some(mut handle) = state.browsers.remove(key) {
            handle.shutdown().await;
        }
    }
}

#[async_trait]
impl ContextProvider for BrowserManager {
    async fn acquire_context(
        &self,
        profile_id: &str,
        options: &ContextOptions,
    ) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        let mut state = self.state.lock().await;

        if let Some(ctx) = state.contexts.get(profile_id) {
            if ctx.is_alive() {
                debug!(profile = profile_id, "Reusing live context");
                let ctx: Arc<dyn BrowserContext> = ctx.clone();
                return Ok(ctx);
            }
        }
        if let Some(stale) = state.contexts.remove(profile_id) {
            warn!(profile = profile_id, "Browser connection lost, relaunching");
            stale.dispose().await;
            Self::release_browser(&mut state, &stale.browser_key()).await;
        }

        let strategies = options
            .strategies
            .clone()
            .unwrap_or_else(|| self.config.strategies.clone());
        let headless = options.headless.unwrap_or(self.config.headless);
        let baseline = self.load_state(profile_id).await;

        let ready: HashSet<String> = state
            .browsers
            .iter()
            .filter(|(_, h)| h.is_ready())
            .map(|(k, _)| k.clone())
            .collect();
        let config = &self.config;

        let (strategy, launched) = launch::run_chain(&strategies, |strategy| {
            let reuse = ready.contains(&strategy.browser_key(profile_id));
            async move {
                if reuse {
                    Ok(None)
                } else {
                    launch::launch(strategy, profile_id, config, headless)
                        .await
                        .map(Some)
                }
            }
        })
        .await?;

        let key = strategy.browser_key(profile_id);
        if let Some(launched) = launched {
            // A dead handle under the same key is replaced.
            if let Some(mut old) = state.browsers.remove(&key) {
                old.shutdown().await;
            }
            state
                .browsers
                .insert(key.clone(), BrowserHandle::new(key.clone(), launched));
        }

        let client = state
            .browsers
            .get(&key)
            .map(|h| h.client.clone())
            .ok_or(BrowserError::NotConnected)?;

        match self.open_context(profile_id, strategy, client, baseline).await {
            Ok(ctx) => {
                if let Some(handle) = state.browsers.get_mut(&key) {
                    handle.attached += 1;
                }
                state.contexts.insert(profile_id.to_string(), ctx.clone());
                info!(profile = profile_id, strategy = %strategy, "Browser context ready");
                Ok(ctx as Arc<dyn BrowserContext>)
            }
            Err(e) => {
                if state.browsers.get(&key).is_some_and(|h| h.attached == 0) {
                    if let Some(mut handle) = state.browsers.remove(&key) {
                        handle.shutdown().await;
                    }
                }
                Err(e)
            }
        }
    }

    async fn close(&self, profile_id: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().await;
        let Some(ctx) = state.contexts.remove(profile_id) else {
            debug!(profile = profile_id, "No live context to close");
            return Ok(());
        };

        if ctx.is_alive() {
            if let Err(e) = ctx.persist_state().await {
                warn!(profile = profile_id, "Failed to persist session state: {}", e);
            }
        }
        ctx.dispose().await;
        Self::release_browser(&mut state, &ctx.browser_key()).await;

        info!(profile = profile_id, "Browser session closed");
        Ok(())
    }

    async fn shutdown(&self) {
        for profile in self.live_profiles().await {
            if let Err(e) = ContextProvider::close(self, &profile).await {
                warn!(profile = %profile, "Error closing session: {}", e);
            }
        }

        let mut state = self.state.lock().await;
        let keys: Vec<String> = state.browsers.keys().cloned().collect();
        for key in keys {
            if let Some(mut handle) = state.browsers.remove(&key) {
                handle.shutdown().await;
            }
        }
    }

    async fn live_profiles(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut profiles: Vec<String> = state.contexts.keys().cloned().collect();
        profiles.sort();
        profiles
    }
}
