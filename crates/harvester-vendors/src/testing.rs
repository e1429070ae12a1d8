//! Scripted fake browser for exercising vendor automation without Chrome.
//!
//! A [`FakeSite`] simulates one vendor web site driven by the vendor's
//! descriptor selectors: a login form (optionally with CAPTCHA or TOTP), a
//! paginated invoice listing, and detail pages with a download control.
//! [`FakeProvider`] hands out [`FakeContext`]s over those sites and restores
//! the site's logged-in state from the session store like a real browser
//! restoring cookies.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harvester_browser::{
    BrowserContext, BrowserError, ContextOptions, ContextProvider, DownloadedFile, ListingRow,
    MemorySessionStore, Page, SessionState, SessionStore, StoredCookie,
};
use harvester_otp::TotpGenerator;
use parking_lot::Mutex;
use serde_json::Value;

use crate::descriptor::VendorDescriptor;

const SESSION_COOKIE: &str = "session-token";
const DETAIL_PREFIX: &str = "https://vendor.test/invoice/";

/// One invoice offered by a fake site.
#[derive(Debug, Clone)]
pub struct FakeInvoice {
    pub number: String,
    pub date: String,
    pub amount: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Username,
    Password,
    Totp,
}

struct SiteState {
    descriptor: VendorDescriptor,
    username: String,
    password: String,
    captcha: bool,
    totp_secret: Option<Vec<u8>>,
    page_size: usize,
    linkless_rows: usize,
    invoices: Vec<FakeInvoice>,
    failing_downloads: HashSet<String>,
    authenticated: bool,
    stage: Stage,
    fields: HashMap<String, String>,
    actions: Vec<String>,
}

impl SiteState {
    fn initial_stage(&self) -> Stage {
        if self.descriptor.selectors.continue_button.is_some() {
            Stage::Username
        } else {
            Stage::Password
        }
    }

    fn is(&self, selector: &str, candidate: &Option<String>) -> bool {
        candidate.as_deref() == Some(selector)
    }

    fn submit_password(&mut self) {
        let username = self.field(&self.descriptor.selectors.username);
        let password = self.field(&self.descriptor.selectors.password);
        if username == self.username && password == self.password {
            if self.totp_secret.is_some() {
                self.stage = Stage::Totp;
            } else {
                self.authenticated = true;
            }
        }
    }

    fn submit_totp(&mut self) {
        let code = self.field(&self.descriptor.selectors.totp_input);
        let accepted = self.totp_secret.as_ref().is_some_and(|secret| {
            TotpGenerator::default()
                .window(secret, 1)
                .map(|codes| codes.contains(&code))
                .unwrap_or(false)
        });
        if accepted {
            self.authenticated = true;
        }
    }

    fn field(&self, selector: &Option<String>) -> String {
        selector
            .as_ref()
            .and_then(|s| self.fields.get(s))
            .cloned()
            .unwrap_or_default()
    }
}

/// A simulated vendor web site shared by every page of a context.
#[derive(Clone)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub const USERNAME: &'static str = "buyer@example.com";
    pub const PASSWORD: &'static str = "correct horse battery";

    pub fn new(descriptor: VendorDescriptor) -> Self {
        let mut state = SiteState {
            descriptor,
            username: Self::USERNAME.to_string(),
            password: Self::PASSWORD.to_string(),
            captcha: false,
            totp_secret: None,
            page_size: 10,
            linkless_rows: 0,
            invoices: Vec::new(),
            failing_downloads: HashSet::new(),
            authenticated: false,
            stage: Stage::Username,
            fields: HashMap::new(),
            actions: Vec::new(),
        };
        state.stage = state.initial_stage();
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Show a CAPTCHA after the username step.
    pub fn with_captcha(self) -> Self {
        self.state.lock().captcha = true;
        self
    }

    /// Require a TOTP code derived from `secret` after the password.
    pub fn with_totp(self, secret: &[u8]) -> Self {
        self.state.lock().totp_secret = Some(secret.to_vec());
        self
    }

    pub fn with_page_size(self, size: usize) -> Self {
        self.state.lock().page_size = size.max(1);
        self
    }

    /// Add rows without an invoice link to the first listing page.
    pub fn with_linkless_rows(self, count: usize) -> Self {
        self.state.lock().linkless_rows = count;
        self
    }

    pub fn with_invoice(self, number: &str, date: &str, amount: &str) -> Self {
        self.state.lock().invoices.push(FakeInvoice {
            number: number.to_string(),
            date: date.to_string(),
            amount: amount.to_string(),
            bytes: format!("%PDF-1.4 invoice {}", number).into_bytes(),
        });
        self
    }

    /// Add `count` invoices numbered `INV-0001` upwards.
    pub fn with_invoices(mut self, count: usize) -> Self {
        for i in 1..=count {
            self = self.with_invoice(
                &format!("INV-{:04}", i),
                &format!("March {}, 2024", i.min(28)),
                &format!("${}.99", i * 10),
            );
        }
        self
    }

    pub fn failing_download(self, number: &str) -> Self {
        self.state.lock().failing_downloads.insert(number.to_string());
        self
    }

    /// Start logged in, as if a valid session cookie were present.
    pub fn logged_in(self) -> Self {
        self.state.lock().authenticated = true;
        self
    }

    /// Finish login out of band, as a human would in a visible browser.
    pub fn complete_manually(&self) {
        self.state.lock().authenticated = true;
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().authenticated
    }

    /// Recorded page interactions (`goto ...`, `fill ...`, `click ...`,
    /// `download ...`, `filter ...`). Filled values are not recorded.
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn downloads(&self) -> usize {
        self.actions()
            .iter()
            .filter(|a| a.starts_with("download "))
            .count()
    }

    pub fn descriptor(&self) -> VendorDescriptor {
        self.state.lock().descriptor.clone()
    }

    fn restore(&self, state: &SessionState) {
        if state.cookies.iter().any(|c| c.name == SESSION_COOKIE) {
            self.state.lock().authenticated = true;
        }
    }

    fn session_state(&self) -> SessionState {
        let mut state = SessionState::default();
        if self.is_authenticated() {
            state.cookies.push(StoredCookie {
                name: SESSION_COOKIE.to_string(),
                value: "fake-session".to_string(),
                domain: ".vendor.test".to_string(),
                path: "/".to_string(),
                expires: None,
                http_only: true,
                secure: true,
                same_site: Some("Lax".to_string()),
            });
        }
        state
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Blank,
    Login,
    Listing(usize),
    Detail(usize),
    Other(String),
}

/// One tab on a [`FakeSite`].
pub struct FakePage {
    id: String,
    site: FakeSite,
    location: Mutex<Location>,
    closed: AtomicBool,
}

impl FakePage {
    fn new(id: String, site: FakeSite) -> Self {
        Self {
            id,
            site,
            location: Mutex::new(Location::Blank),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<(), BrowserError> {
        if self.is_closed() {
            Err(BrowserError::ContextClosed(self.id.clone()))
        } else {
            Ok(())
        }
    }

    /// Current location after applying redirects caused by site state.
    fn location(&self) -> Location {
        let mut location = self.location.lock();
        if *location == Location::Login && self.site.is_authenticated() {
            *location = Location::Listing(0);
        }
        location.clone()
    }

    fn record(&self, action: String) {
        self.site.state.lock().actions.push(action);
    }

    fn missing(selector: &str) -> BrowserError {
        BrowserError::ElementNotFound(selector.to_string())
    }
}

#[async_trait]
impl Page for FakePage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.check_open()?;
        self.record(format!("goto {}", url));

        let state = self.site.state.lock();
        let next = if url == state.descriptor.invoice_list_url {
            if state.authenticated {
                Location::Listing(0)
            } else {
                Location::Login
            }
        } else if url == state.descriptor.login_url {
            Location::Login
        } else if let Some(index) = url
            .strip_prefix(DETAIL_PREFIX)
            .and_then(|i| i.parse::<usize>().ok())
        {
            if index >= state.invoices.len() {
                return Err(BrowserError::NavigationFailed(format!("404 {}", url)));
            }
            Location::Detail(index)
        } else {
            Location::Other(url.to_string())
        };
        drop(state);

        *self.location.lock() = next;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.check_open()?;
        let location = self.location();
        let state = self.site.state.lock();
        Ok(match location {
            Location::Blank => "about:blank".to_string(),
            Location::Login => state.descriptor.login_url.clone(),
            Location::Listing(page) if page == 0 => state.descriptor.invoice_list_url.clone(),
            Location::Listing(page) => {
                format!("{}?page={}", state.descriptor.invoice_list_url, page + 1)
            }
            Location::Detail(index) => format!("{}{}", DETAIL_PREFIX, index),
            Location::Other(url) => url,
        })
    }

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
        self.check_open()?;
        let location = self.location();
        let state = self.site.state.lock();
        let s = &state.descriptor.selectors;

        Ok(match location {
            Location::Login if !state.authenticated => {
                let same_form = s.continue_button.is_none() && state.stage == Stage::Password;
                let captcha_shown = state.captcha && state.stage != Stage::Username;
                if state.is(selector, &s.username) {
                    state.stage == Stage::Username || same_form
                } else if s.captcha.iter().any(|c| c == selector) {
                    captcha_shown
                } else if state.is(selector, &s.password) {
                    state.stage == Stage::Password && !captcha_shown
                } else if state.is(selector, &s.totp_input) || state.is(selector, &s.totp_submit) {
                    state.stage == Stage::Totp
                } else {
                    state.is(selector, &s.continue_button) && state.stage == Stage::Username
                        || state.is(selector, &s.submit) && state.stage == Stage::Password
                }
            }
            Location::Listing(page) => {
                if state.is(selector, &s.next_page) {
                    (page + 1) * state.page_size < state.invoices.len()
                } else {
                    selector == s.listing_row || state.is(selector, &s.date_filter)
                }
            }
            Location::Detail(_) => {
                selector == s.download_button
                    || state.is(selector, &s.invoice_number)
                    || state.is(selector, &s.invoice_date)
                    || state.is(selector, &s.invoice_amount)
            }
            _ => false,
        })
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        if !self.exists(selector).await? {
            return Err(Self::missing(selector));
        }
        let mut state = self.site.state.lock();
        state.fields.insert(selector.to_string(), value.to_string());
        state.actions.push(format!("fill {}", selector));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        if !self.exists(selector).await? {
            return Err(Self::missing(selector));
        }
        self.record(format!("click {}", selector));

        let location = self.location();
        let mut state = self.site.state.lock();
        let s = state.descriptor.selectors.clone();

        if let Location::Listing(page) = location {
            if state.is(selector, &s.next_page) {
                drop(state);
                *self.location.lock() = Location::Listing(page + 1);
            }
            return Ok(());
        }

        if state.is(selector, &s.continue_button) && state.stage == Stage::Username {
            if state.field(&s.username) == state.username {
                state.stage = Stage::Password;
            }
        } else if state.is(selector, &s.submit) && state.stage == Stage::Password {
            state.submit_password();
        } else if state.is(selector, &s.totp_submit) && state.stage == Stage::Totp {
            state.submit_totp();
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        self.check_open()?;
        self.record(format!("press {}", key));
        if key != "Enter" {
            return Ok(());
        }
        let mut state = self.site.state.lock();
        match state.stage {
            Stage::Password => state.submit_password(),
            Stage::Totp => state.submit_totp(),
            Stage::Username => {}
        }
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        self.check_open()?;
        let Location::Detail(index) = self.location() else {
            return Ok(None);
        };
        let state = self.site.state.lock();
        let s = &state.descriptor.selectors;
        let invoice = &state.invoices[index];

        Ok(if state.is(selector, &s.invoice_number) {
            Some(format!("Order # {}", invoice.number))
        } else if state.is(selector, &s.invoice_date) {
            Some(format!("Order placed {}", invoice.date))
        } else if state.is(selector, &s.invoice_amount) {
            Some(invoice.amount.clone())
        } else {
            None
        })
    }

    async fn attribute_of(
        &self,
        _selector: &str,
        _name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.check_open()?;
        Ok(None)
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        if !self.exists(selector).await? {
            return Err(Self::missing(selector));
        }
        self.record(format!("filter {}", value));
        Ok(())
    }

    async fn rows(
        &self,
        row_selector: &str,
        _link_selector: &str,
    ) -> Result<Vec<ListingRow>, BrowserError> {
        self.check_open()?;
        let Location::Listing(page) = self.location() else {
            return Ok(Vec::new());
        };
        let state = self.site.state.lock();
        if row_selector != state.descriptor.selectors.listing_row {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        if page == 0 {
            rows.extend((0..state.linkless_rows).map(|i| ListingRow {
                text: format!("Subscription notice {}", i),
                href: None,
            }));
        }
        let start = page * state.page_size;
        let end = (start + state.page_size).min(state.invoices.len());
        for index in start..end {
            let invoice = &state.invoices[index];
            rows.push(ListingRow {
                text: format!("Order # {} placed {} total {}", invoice.number, invoice.date, invoice.amount),
                href: Some(format!("{}{}", DETAIL_PREFIX, index)),
            });
        }
        Ok(rows)
    }

    async fn evaluate(&self, _script: &str) -> Result<Value, BrowserError> {
        self.check_open()?;
        Ok(Value::Null)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        self.check_open()?;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn download(
        &self,
        trigger_selector: &str,
        _timeout: Duration,
    ) -> Result<DownloadedFile, BrowserError> {
        self.check_open()?;
        let Location::Detail(index) = self.location() else {
            return Err(Self::missing(trigger_selector));
        };
        let state = self.site.state.lock();
        if trigger_selector != state.descriptor.selectors.download_button {
            return Err(Self::missing(trigger_selector));
        }
        let invoice = state.invoices[index].clone();
        drop(state);

        if self.site.state.lock().failing_downloads.contains(&invoice.number) {
            return Err(BrowserError::DownloadFailed(format!(
                "server error for {}",
                invoice.number
            )));
        }
        self.record(format!("download {}", invoice.number));
        Ok(DownloadedFile {
            file_name: format!("{}.pdf", invoice.number),
            content_type: Some("application/pdf".to_string()),
            bytes: invoice.bytes,
        })
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Context over one [`FakeSite`].
pub struct FakeContext {
    profile_id: String,
    site: FakeSite,
    store: Arc<dyn SessionStore>,
    pages: Mutex<Vec<Arc<FakePage>>>,
    persisted: AtomicUsize,
}

impl FakeContext {
    pub fn new(profile_id: &str, site: FakeSite, store: Arc<dyn SessionStore>) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            site,
            store,
            pages: Mutex::new(Vec::new()),
            persisted: AtomicUsize::new(0),
        }
    }

    /// Number of successful `persist_state` calls.
    pub fn persisted(&self) -> usize {
        self.persisted.load(Ordering::SeqCst)
    }

    /// Pages opened and not yet closed.
    pub fn open_pages(&self) -> usize {
        self.pages.lock().iter().filter(|p| !p.is_closed()).count()
    }

    fn close_pages(&self) {
        for page in self.pages.lock().iter() {
            page.closed.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl BrowserContext for FakeContext {
    fn profile_id(&self) -> &str {
        &self.profile_id
    }

    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError> {
        let mut pages = self.pages.lock();
        let page = Arc::new(FakePage::new(
            format!("{}-page-{}", self.profile_id, pages.len()),
            self.site.clone(),
        ));
        pages.push(Arc::clone(&page));
        Ok(page as Arc<dyn Page>)
    }

    async fn capture_state(&self) -> Result<SessionState, BrowserError> {
        Ok(self.site.session_state())
    }

    async fn persist_state(&self) -> Result<(), BrowserError> {
        let state = self.capture_state().await?;
        self.store.save(&self.profile_id, &state).await?;
        self.persisted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`ContextProvider`] over a set of fake sites keyed by profile id.
pub struct FakeProvider {
    sites: Mutex<HashMap<String, FakeSite>>,
    store: Arc<MemorySessionStore>,
    contexts: Mutex<HashMap<String, Arc<FakeContext>>>,
    acquired: AtomicUsize,
    closed: AtomicUsize,
    unavailable: AtomicBool,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            sites: Mutex::new(HashMap::new()),
            store: Arc::new(MemorySessionStore::new()),
            contexts: Mutex::new(HashMap::new()),
            acquired: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_site(self, profile_id: &str, site: FakeSite) -> Self {
        self.sites.lock().insert(profile_id.to_string(), site);
        self
    }

    /// Make every acquisition fail as if no browser could be launched.
    pub fn unavailable(self) -> Self {
        self.unavailable.store(true, Ordering::SeqCst);
        self
    }

    pub fn store(&self) -> Arc<MemorySessionStore> {
        Arc::clone(&self.store)
    }

    pub fn context(&self, profile_id: &str) -> Option<Arc<FakeContext>> {
        self.contexts.lock().get(profile_id).cloned()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextProvider for FakeProvider {
    async fn acquire_context(
        &self,
        profile_id: &str,
        _options: &ContextOptions,
    ) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrowserError::LaunchChainExhausted(Vec::new()));
        }
        if let Some(context) = self.context(profile_id) {
            return Ok(context as Arc<dyn BrowserContext>);
        }

        let site = self
            .sites
            .lock()
            .get(profile_id)
            .cloned()
            .ok_or_else(|| BrowserError::InvalidConfig(format!("no site for {}", profile_id)))?;
        if let Ok(Some(state)) = self.store.load(profile_id).await {
            site.restore(&state);
        }

        let store: Arc<dyn SessionStore> = self.store.clone();
        let context = Arc::new(FakeContext::new(profile_id, site, store));
        self.contexts
            .lock()
            .insert(profile_id.to_string(), Arc::clone(&context));
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(context as Arc<dyn BrowserContext>)
    }

    async fn close(&self, profile_id: &str) -> Result<(), BrowserError> {
        let Some(context) = self.contexts.lock().remove(profile_id) else {
            return Ok(());
        };
        context.persist_state().await?;
        context.close_pages();
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) {
        let profiles = self.live_profiles().await;
        for profile in profiles {
            let _ = self.close(&profile).await;
        }
    }

    async fn live_profiles(&self) -> Vec<String> {
        let mut profiles: Vec<String> = self.contexts.lock().keys().cloned().collect();
        profiles.sort();
        profiles
    }
}
