//! Vendor capability trait and the descriptor-driven implementation.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use harvester_browser::{BrowserContext, ContextOptions, ContextProvider, Page};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::descriptor::VendorDescriptor;
use crate::error::VendorError;
use crate::extract::scan;
use crate::login::{LoginFlow, LoginOutcome, LoginTimings};
use crate::pipeline::{DownloadPipeline, DownloadReport};
use crate::storage::{ArtifactStore, MetadataLedger};

/// Shared infrastructure handed to every vendor automation.
pub struct VendorServices {
    pub browser: Arc<dyn ContextProvider>,
    pub ledger: Arc<dyn MetadataLedger>,
    pub artifacts: Arc<ArtifactStore>,
    /// Where login screenshots go before a manual wait.
    pub screenshots_dir: Option<PathBuf>,
    pub login_timings: LoginTimings,
    pub context_options: ContextOptions,
}

impl VendorServices {
    pub fn new(
        browser: Arc<dyn ContextProvider>,
        ledger: Arc<dyn MetadataLedger>,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            browser,
            ledger,
            artifacts,
            screenshots_dir: None,
            login_timings: LoginTimings::default(),
            context_options: ContextOptions::default(),
        }
    }

    pub fn with_screenshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshots_dir = Some(dir.into());
        self
    }

    pub fn with_login_timings(mut self, timings: LoginTimings) -> Self {
        self.login_timings = timings;
        self
    }

    pub fn with_context_options(mut self, options: ContextOptions) -> Self {
        self.context_options = options;
        self
    }
}

/// Parameters of one download run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Maximum invoices to consider; the vendor default when absent.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Only invoices issued on or after this date.
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
}

/// Live state of one vendor job.
pub struct VendorRun {
    pub descriptor: VendorDescriptor,
    pub context: Arc<dyn BrowserContext>,
    pub page: Arc<dyn Page>,
    pub authenticated: bool,
}

/// What every vendor automation can do.
#[async_trait]
pub trait VendorAutomation: Send + Sync {
    fn descriptor(&self) -> &VendorDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Acquire a browser context and a working page.
    async fn initialize(&self) -> Result<VendorRun, VendorError>;

    /// Establish an authenticated session on `run.page`.
    async fn login(
        &self,
        run: &mut VendorRun,
        credential: &Credential,
    ) -> Result<LoginOutcome, VendorError>;

    /// Scan the listing and download new invoices.
    async fn download_invoices(
        &self,
        run: &mut VendorRun,
        options: &RunOptions,
    ) -> Result<DownloadReport, VendorError>;

    /// Release the page and the context, persisting the session.
    async fn close(&self, run: VendorRun) -> Result<(), VendorError>;
}

/// [`VendorAutomation`] driven entirely by a [`VendorDescriptor`].
pub struct ScriptedVendor {
    descriptor: VendorDescriptor,
    services: Arc<VendorServices>,
}

impl ScriptedVendor {
    pub fn new(descriptor: VendorDescriptor, services: Arc<VendorServices>) -> Self {
        Self {
            descriptor,
            services,
        }
    }

    /// Browser profile used for this vendor.
    pub fn profile_id(&self) -> &str {
        &self.descriptor.id
    }
}

#[async_trait]
impl VendorAutomation for ScriptedVendor {
    fn descriptor(&self) -> &VendorDescriptor {
        &self.descriptor
    }

    async fn initialize(&self) -> Result<VendorRun, VendorError> {
        let browser = &self.services.browser;
        let context = browser
            .acquire_context(self.profile_id(), &self.services.context_options)
            .await?;

        let page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close(self.profile_id()).await {
                    warn!(vendor = %self.descriptor.id, "Cleanup after failed initialize: {}", close_err);
                }
                return Err(e.into());
            }
        };

        debug!(vendor = %self.descriptor.id, page = %page.id(), "Vendor run initialized");
        Ok(VendorRun {
            descriptor: self.descriptor.clone(),
            context,
            page,
            authenticated: false,
        })
    }

    async fn login(
        &self,
        run: &mut VendorRun,
        credential: &Credential,
    ) -> Result<LoginOutcome, VendorError> {
        let outcome = LoginFlow::new(
            run.page.as_ref(),
            run.context.as_ref(),
            &run.descriptor,
            self.services.login_timings,
        )
        .with_screenshots(self.services.screenshots_dir.as_deref())
        .run(credential)
        .await?;

        run.authenticated = true;
        Ok(outcome)
    }

    async fn download_invoices(
        &self,
        run: &mut VendorRun,
        options: &RunOptions,
    ) -> Result<DownloadReport, VendorError> {
        if !run.authenticated {
            return Err(VendorError::Extraction(format!(
                "{} is not logged in",
                run.descriptor.id
            )));
        }

        let descriptor = &run.descriptor;
        let limit = options.limit.unwrap_or(descriptor.default_limit);
        run.page.goto(&descriptor.invoice_list_url).await?;

        let listing = scan(run.page.as_ref(), descriptor, limit, options.from_date).await?;
        if listing.skipped_rows > 0 {
            debug!(vendor = %descriptor.id, rows = listing.skipped_rows, "Listing rows without invoice link");
        }

        let report = DownloadPipeline::new(
            run.context.as_ref(),
            descriptor,
            self.services.ledger.as_ref(),
            &self.services.artifacts,
        )
        .download_all(&listing.candidates, options.from_date)
        .await;
        Ok(report)
    }

    async fn close(&self, run: VendorRun) -> Result<(), VendorError> {
        if let Err(e) = run.page.close().await {
            debug!(vendor = %run.descriptor.id, "Page already gone: {}", e);
        }
        drop(run);
        self.services.browser.close(self.profile_id()).await?;
        info!(vendor = %self.descriptor.id, "Vendor session closed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "automation_tests.rs"]
mod tests;
