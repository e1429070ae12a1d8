//! Login state machine.
//!
//! ```text
//! CheckingExisting -> Authenticated
//!                  -> NeedsCredential -> SubmittingCredential -> Authenticated
//!                                                             -> NeedsInteraction
//!                     -> WaitingForManualCompletion -> Authenticated | Failed
//! ```
//!
//! Every wait is a bounded poll of a page predicate; nothing subscribes to
//! browser events.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use harvester_browser::{capture_screenshot, BrowserContext, Page};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::descriptor::VendorDescriptor;
use crate::error::VendorError;

/// Where a login attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginPhase {
    CheckingExisting,
    NeedsCredential,
    SubmittingCredential,
    NeedsInteraction,
    WaitingForManualCompletion,
    Authenticated,
    Failed,
}

impl LoginPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckingExisting => "checking_existing",
            Self::NeedsCredential => "needs_credential",
            Self::SubmittingCredential => "submitting_credential",
            Self::NeedsInteraction => "needs_interaction",
            Self::WaitingForManualCompletion => "waiting_for_manual_completion",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LoginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds for the automatic part of a login. The manual wait uses the
/// vendor's own `auth_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTimings {
    /// How long to wait for a form field to appear.
    pub selector_timeout: Duration,
    /// How long to wait for the authenticated URL after a submit.
    pub confirm_grace: Duration,
    pub poll_interval: Duration,
}

impl Default for LoginTimings {
    fn default() -> Self {
        Self {
            selector_timeout: Duration::from_secs(10),
            confirm_grace: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// How authentication was reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginOutcome {
    /// The restored session was already valid.
    pub restored: bool,
    /// A human finished the login.
    pub manual: bool,
}

/// Poll `predicate` every `interval` until it holds or `timeout` elapses.
///
/// The predicate is always evaluated at least once.
pub async fn wait_until<F, Fut>(mut predicate: F, interval: Duration, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if predicate().await {
            return true;
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return false;
        }
        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

/// One login attempt against one vendor page.
pub struct LoginFlow<'a> {
    page: &'a dyn Page,
    context: &'a dyn BrowserContext,
    descriptor: &'a VendorDescriptor,
    timings: LoginTimings,
    screenshots_dir: Option<PathBuf>,
    phase: LoginPhase,
}

impl<'a> LoginFlow<'a> {
    pub fn new(
        page: &'a dyn Page,
        context: &'a dyn BrowserContext,
        descriptor: &'a VendorDescriptor,
        timings: LoginTimings,
    ) -> Self {
        Self {
            page,
            context,
            descriptor,
            timings,
            screenshots_dir: None,
            phase: LoginPhase::CheckingExisting,
        }
    }

    /// Save a screenshot here before waiting for a human.
    pub fn with_screenshots(mut self, dir: Option<&Path>) -> Self {
        self.screenshots_dir = dir.map(Path::to_path_buf);
        self
    }

    pub fn phase(&self) -> LoginPhase {
        self.phase
    }

    /// Drive the page to an authenticated state and persist the session.
    pub async fn run(mut self, credential: &Credential) -> Result<LoginOutcome, VendorError> {
        match self.establish(credential).await {
            Ok(outcome) => {
                self.transition(LoginPhase::Authenticated);
                info!(
                    vendor = %self.descriptor.id,
                    restored = outcome.restored,
                    manual = outcome.manual,
                    "Authenticated"
                );
                if let Err(e) = self.context.persist_state().await {
                    warn!(vendor = %self.descriptor.id, "Failed to persist session state: {}", e);
                }
                Ok(outcome)
            }
            Err(e) => {
                self.transition(LoginPhase::Failed);
                warn!(vendor = %self.descriptor.id, "Login failed: {}", e);
                Err(e)
            }
        }
    }

    async fn establish(&mut self, credential: &Credential) -> Result<LoginOutcome, VendorError> {
        let descriptor = self.descriptor;
        let selectors = &descriptor.selectors;
        let timings = self.timings;

        self.page
            .goto(&descriptor.invoice_list_url)
            .await
            .map_err(|e| self.fail(format!("navigation to invoice list failed: {}", e)))?;
        if self.is_authenticated().await {
            return Ok(LoginOutcome {
                restored: true,
                manual: false,
            });
        }

        self.transition(LoginPhase::NeedsCredential);
        if let Some(username) = &selectors.username {
            if !self.page.wait_for(username, timings.selector_timeout).await? {
                if self.captcha_present().await {
                    return self.manual("captcha before username").await;
                }
                self.page
                    .goto(&descriptor.login_url)
                    .await
                    .map_err(|e| self.fail(format!("navigation to login page failed: {}", e)))?;
                if !self.page.wait_for(username, timings.selector_timeout).await? {
                    if self.captcha_present().await {
                        return self.manual("captcha before username").await;
                    }
                    return Err(self.fail("username field not found".to_string()));
                }
            }

            self.transition(LoginPhase::SubmittingCredential);
            self.page
                .fill(username, &credential.username)
                .await
                .map_err(|e| self.fail(format!("could not enter username: {}", e)))?;
            if let Some(continue_button) = &selectors.continue_button {
                if self.page.exists(continue_button).await? {
                    self.page
                        .click(continue_button)
                        .await
                        .map_err(|e| self.fail(format!("could not continue: {}", e)))?;
                }
            }
        } else {
            self.transition(LoginPhase::SubmittingCredential);
        }

        if let Some(password) = &selectors.password {
            let this = &*self;
            wait_until(
                move || async move {
                    this.visible(password).await || this.captcha_present().await
                },
                timings.poll_interval,
                timings.selector_timeout,
            )
            .await;

            if self.captcha_present().await {
                return self.manual("captcha").await;
            }
            // No password field usually means the vendor already knows us.
            if self.visible(password).await {
                self.page
                    .fill(password, &credential.password)
                    .await
                    .map_err(|e| self.fail(format!("could not enter password: {}", e)))?;
                self.submit(selectors.submit.as_deref()).await?;
            }
        }

        if self.confirm_or_second_factor().await {
            return Ok(LoginOutcome::default());
        }
        if self.captcha_present().await {
            return self.manual("captcha after submit").await;
        }

        if let Some(totp_input) = &selectors.totp_input {
            if self.visible(totp_input).await {
                let code = match credential.current_totp() {
                    Ok(Some(code)) => code,
                    Ok(None) => return self.manual("second factor without TOTP secret").await,
                    Err(e) => {
                        warn!(vendor = %descriptor.id, "TOTP unavailable: {}", e);
                        return self.manual("second factor with unusable TOTP secret").await;
                    }
                };
                debug!(vendor = %descriptor.id, "Submitting TOTP code");
                self.page
                    .fill(totp_input, &code)
                    .await
                    .map_err(|e| self.fail(format!("could not enter TOTP code: {}", e)))?;
                self.submit(selectors.totp_submit.as_deref()).await?;

                if self.confirm().await {
                    return Ok(LoginOutcome::default());
                }
            }
        }

        if descriptor.interaction_required {
            return self.manual("vendor requires interaction").await;
        }

        self.page
            .goto(&descriptor.invoice_list_url)
            .await
            .map_err(|e| self.fail(format!("navigation to invoice list failed: {}", e)))?;
        if self.is_authenticated().await {
            return Ok(LoginOutcome::default());
        }
        Err(self.fail("not authenticated after submitting credentials".to_string()))
    }

    /// Wait out the grace period for the authenticated URL, stopping early
    /// when a TOTP field or CAPTCHA shows up instead.
    async fn confirm_or_second_factor(&self) -> bool {
        let totp = self.descriptor.selectors.totp_input.as_deref();
        wait_until(
            move || async move {
                if self.is_authenticated().await {
                    return true;
                }
                let totp_shown = match totp {
                    Some(selector) => self.visible(selector).await,
                    None => false,
                };
                totp_shown || self.captcha_present().await
            },
            self.timings.poll_interval,
            self.timings.confirm_grace,
        )
        .await;
        self.is_authenticated().await
    }

    async fn confirm(&self) -> bool {
        wait_until(
            move || self.is_authenticated(),
            self.timings.poll_interval,
            self.timings.confirm_grace,
        )
        .await
    }

    async fn manual(&mut self, reason: &str) -> Result<LoginOutcome, VendorError> {
        self.transition(LoginPhase::NeedsInteraction);
        let timeout = self.descriptor.auth_timeout;
        info!(
            vendor = %self.descriptor.id,
            reason,
            timeout_secs = timeout.as_secs(),
            "Manual login required, complete it in the browser window"
        );

        if let Some(dir) = &self.screenshots_dir {
            let dest = dir.join(format!(
                "{}-login-{}.png",
                self.descriptor.id,
                Utc::now().format("%Y%m%dT%H%M%S")
            ));
            capture_screenshot(self.page, &dest).await;
        }

        self.transition(LoginPhase::WaitingForManualCompletion);
        let this = &*self;
        if wait_until(move || this.is_authenticated(), this.timings.poll_interval, timeout).await {
            return Ok(LoginOutcome {
                restored: false,
                manual: true,
            });
        }
        Err(self.fail(format!(
            "timeout after {}s waiting for manual login ({})",
            timeout.as_secs(),
            reason
        )))
    }

    async fn submit(&self, button: Option<&str>) -> Result<(), VendorError> {
        let result = match button {
            Some(selector) if self.visible(selector).await => self.page.click(selector).await,
            _ => self.page.press_key("Enter").await,
        };
        result.map_err(|e| self.fail(format!("could not submit: {}", e)))
    }

    async fn is_authenticated(&self) -> bool {
        match self.page.current_url().await {
            Ok(url) => self.descriptor.is_authenticated_url(&url),
            Err(e) => {
                debug!(vendor = %self.descriptor.id, "URL check failed: {}", e);
                false
            }
        }
    }

    async fn visible(&self, selector: &str) -> bool {
        self.page.exists(selector).await.unwrap_or(false)
    }

    async fn captcha_present(&self) -> bool {
        for selector in &self.descriptor.selectors.captcha {
            if self.visible(selector).await {
                return true;
            }
        }
        false
    }

    fn transition(&mut self, next: LoginPhase) {
        if self.phase != next {
            debug!(
                vendor = %self.descriptor.id,
                from = %self.phase,
                to = %next,
                "Login phase transition"
            );
            self.phase = next;
        }
    }

    fn fail(&self, reason: String) -> VendorError {
        VendorError::LoginFailed {
            vendor: self.descriptor.id.clone(),
            phase: self.phase,
            reason,
        }
    }
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
