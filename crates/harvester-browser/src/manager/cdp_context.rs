//! CDP-backed [`BrowserContext`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cdp::CdpClient;
use crate::launch::LaunchStrategy;
use crate::page::{BrowserContext, Page};
use crate::session_store::SessionStore;
use crate::state::{SessionState, StoredCookie};

use super::cdp_page::CdpPage;
use super::BrowserError;

/// Everything a context needs, assembled by the manager.
pub(super) struct ContextParts {
    pub profile_id: String,
    pub strategy: LaunchStrategy,
    pub client: Arc<CdpClient>,
    pub browser_context_id: Option<String>,
    pub download_dir: PathBuf,
    pub viewport: (u32, u32),
    pub store: Arc<dyn SessionStore>,
    pub baseline: SessionState,
}

/// One profile's cookie and storage jar inside a browser.
///
/// Shared browsers get a dedicated CDP browser context; a persistent
/// profile browser uses its default context.
pub struct CdpContext {
    profile_id: String,
    strategy: LaunchStrategy,
    client: Arc<CdpClient>,
    browser_context_id: Option<String>,
    download_dir: PathBuf,
    viewport: (u32, u32),
    store: Arc<dyn SessionStore>,
    /// State loaded at acquisition; origins not visited this run carry over.
    baseline: SessionState,
    seed_script: Option<String>,
    pages: Mutex<Vec<Weak<CdpPage>>>,
    closed: AtomicBool,
}

impl CdpContext {
    pub(super) fn new(parts: ContextParts) -> Self {
        let seed_script = parts.baseline.origin_seed_script();
        Self {
            profile_id: parts.profile_id,
            strategy: parts.strategy,
            client: parts.client,
            browser_context_id: parts.browser_context_id,
            download_dir: parts.download_dir,
            viewport: parts.viewport,
            store: parts.store,
            baseline: parts.baseline,
            seed_script,
            pages: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn strategy(&self) -> LaunchStrategy {
        self.strategy
    }

    pub fn browser_key(&self) -> String {
        self.strategy.browser_key(&self.profile_id)
    }

    /// Still usable: not closed and the browser connection is up.
    pub fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.client.is_connected()
    }

    fn live_pages(&self) -> Vec<Arc<CdpPage>> {
        let mut pages = self.pages.lock();
        pages.retain(|p| p.upgrade().is_some_and(|p| !p.is_closed()));
        pages.iter().filter_map(Weak::upgrade).collect()
    }

    /// Close pages and release the CDP context. Idempotent.
    pub(super) async fn dispose(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for page in self.live_pages() {
            let _ = page.close().await;
        }

        if let Some(id) = &self.browser_context_id {
            if let Err(e) = self.client.dispose_browser_context(id).await {
                debug!(profile = %self.profile_id, "Disposing browser context: {}", e);
            }
        }
    }
}

#[async_trait]
impl BrowserContext for CdpContext {
    fn profile_id(&self) -> &str {
        &self.profile_id
    }

    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError> {
        if !self.is_alive() {
            return Err(BrowserError::ContextClosed(self.profile_id.clone()));
        }

        let session = self
            .client
            .new_page(self.browser_context_id.as_deref())
            .await?;

        let (width, height) = self.viewport;
        if let Err(e) = session.set_viewport(width, height).await {
            warn!(profile = %self.profile_id, "Failed to set viewport: {}", e);
        }
        if let Some(script) = &self.seed_script {
            session.add_init_script(script).await?;
        }

        let page = Arc::new(CdpPage::new(
            session,
            self.client.clone(),
            self.download_dir.clone(),
        ));
        self.pages.lock().push(Arc::downgrade(&page));
        debug!(profile = %self.profile_id, page = page.id(), "Opened page");
        Ok(page)
    }

    async fn capture_state(&self) -> Result<SessionState, BrowserError> {
        let cookies = self
            .client
            .get_cookies(self.browser_context_id.as_deref())
            .await?
            .into_iter()
            .map(StoredCookie::from)
            .collect();

        let mut origins = self.baseline.origins.clone();
        for page in self.live_pages() {
            match page.session.local_storage_snapshot().await {
                Ok(Some((origin, items))) => {
                    origins.insert(origin, items);
                }
                Ok(None) => {}
                Err(e) => debug!(profile = %self.profile_id, "Skipping page storage: {}", e),
            }
        }

        Ok(SessionState { cookies, origins })
    }

    async fn persist_state(&self) -> Result<(), BrowserError> {
        let state = self.capture_state().await?;
        self.store.save(&self.profile_id, &state).await?;
        debug!(
            profile = %self.profile_id,
            cookies = state.cookies.len(),
            "Persisted session state"
        );
        Ok(())
    }
}
