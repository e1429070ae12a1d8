//! Job orchestrator: starts vendor pipelines and records their outcome.

use std::sync::Arc;
use std::time::Duration;

use harvester_browser::ContextProvider;
use harvester_vendors::{
    DownloadReport, RunOptions, VendorAutomation, VendorError, VendorRegistry,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::credentials::CredentialStore;
use crate::error::{JobError, OrchestratorError};
use crate::record::JobRecord;
use crate::tracker::JobTracker;

/// Orchestrator limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound for `download_invoices` of one job.
    pub scan_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(600),
        }
    }
}

/// Result of [`Orchestrator::start_all_jobs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStart {
    /// Vendors queued for the sequential run, in order.
    pub vendors: Vec<String>,
    /// Vendors skipped because a job was already running.
    pub conflicts: Vec<String>,
}

/// Shared pieces a spawned job needs.
#[derive(Clone)]
struct JobContext {
    tracker: Arc<dyn JobTracker>,
    credentials: Arc<dyn CredentialStore>,
    config: OrchestratorConfig,
}

pub struct Orchestrator {
    registry: Arc<VendorRegistry>,
    browser: Arc<dyn ContextProvider>,
    jobs: JobContext,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<VendorRegistry>,
        tracker: Arc<dyn JobTracker>,
        credentials: Arc<dyn CredentialStore>,
        browser: Arc<dyn ContextProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            browser,
            jobs: JobContext {
                tracker,
                credentials,
                config,
            },
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<VendorRegistry> {
        &self.registry
    }

    /// Start a job for `vendor_id` on a background task.
    ///
    /// Returns the `running` record, [`OrchestratorError::UnknownVendor`]
    /// or [`OrchestratorError::Conflict`] when a job is already running.
    pub fn start_job(
        &self,
        vendor_id: &str,
        options: RunOptions,
    ) -> Result<JobRecord, OrchestratorError> {
        let vendor = self
            .registry
            .get(vendor_id)
            .ok_or_else(|| OrchestratorError::UnknownVendor(vendor_id.to_string()))?;
        let record = self.jobs.tracker.try_start(vendor_id)?;
        info!(vendor = %vendor_id, limit = ?options.limit, from_date = ?options.from_date, "Job started");

        let jobs = self.jobs.clone();
        self.track(tokio::spawn(async move {
            jobs.run(vendor, options).await;
        }));
        Ok(record)
    }

    /// Run every registered vendor one after another on a background task.
    ///
    /// Vendors already running are reported and skipped; the rest run in id
    /// order, each finishing before the next begins.
    pub fn start_all_jobs(&self, options: RunOptions) -> BatchStart {
        let mut batch = BatchStart::default();
        for id in self.registry.ids() {
            match self.jobs.tracker.get(&id) {
                Some(record) if record.is_running() => batch.conflicts.push(id),
                _ => batch.vendors.push(id),
            }
        }
        if !batch.conflicts.is_empty() {
            warn!(vendors = ?batch.conflicts, "Skipping vendors with running jobs");
        }

        let vendors: Vec<Arc<dyn VendorAutomation>> = batch
            .vendors
            .iter()
            .filter_map(|id| self.registry.get(id))
            .collect();
        let jobs = self.jobs.clone();
        self.track(tokio::spawn(async move {
            for vendor in vendors {
                if let Err(conflict) = jobs.tracker.try_start(vendor.id()) {
                    warn!(vendor = %vendor.id(), "Skipped: {}", conflict);
                    continue;
                }
                jobs.run(vendor, options.clone()).await;
            }
            info!("Batch run finished");
        }));

        batch
    }

    /// Record for `vendor_id`; `not_started` when it never ran.
    pub fn status(&self, vendor_id: &str) -> JobRecord {
        self.jobs
            .tracker
            .get(vendor_id)
            .unwrap_or_else(|| JobRecord::not_started(vendor_id))
    }

    /// One record per registered vendor, sorted by id.
    pub fn statuses(&self) -> Vec<JobRecord> {
        self.registry.ids().iter().map(|id| self.status(id)).collect()
    }

    /// Wait for every job started so far to finish.
    pub async fn wait_idle(&self) {
        loop {
            let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Job task panicked: {}", e);
                }
            }
        }
    }

    /// Close every live browser session.
    pub async fn shutdown(&self) {
        info!("Closing browser sessions");
        self.browser.shutdown().await;
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }
}

impl JobContext {
    /// Run one already-started job to completion and record the outcome.
    ///
    /// The job body runs on its own task so a panic still leaves a terminal
    /// record instead of a job stuck in `running`.
    async fn run(&self, vendor: Arc<dyn VendorAutomation>, options: RunOptions) {
        let vendor_id = vendor.id().to_string();
        let jobs = self.clone();
        let outcome =
            tokio::spawn(async move { jobs.execute(vendor.as_ref(), &options).await }).await;
        let result = match outcome {
            Ok(result) => result,
            Err(join) => {
                let reason = if join.is_panic() { "job panicked" } else { "job cancelled" };
                error!(vendor = %vendor_id, "Job aborted: {}", reason);
                self.tracker.fail(&vendor_id, reason.to_string());
                return;
            }
        };
        match result {
            Ok(report) => {
                info!(
                    vendor = %vendor_id,
                    downloaded = report.downloaded,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Job completed"
                );
                self.tracker.complete(&vendor_id, &report);
            }
            Err(e) => {
                error!(vendor = %vendor_id, "Job failed: {}", e);
                self.tracker.fail(&vendor_id, e.to_string());
            }
        }
    }

    async fn execute(
        &self,
        vendor: &dyn VendorAutomation,
        options: &RunOptions,
    ) -> Result<DownloadReport, JobError> {
        let vendor_id = vendor.id();
        let credential = self
            .credentials
            .get_credential(vendor_id)
            .await?
            .ok_or_else(|| JobError::NoCredentials(vendor_id.to_string()))?;

        let mut run = vendor.initialize().await?;
        let scan_timeout = self.config.scan_timeout;

        let result: Result<DownloadReport, VendorError> = async {
            vendor.login(&mut run, &credential).await?;
            match tokio::time::timeout(scan_timeout, vendor.download_invoices(&mut run, options))
                .await
            {
                Ok(report) => report,
                Err(_) => Err(VendorError::Timeout(format!(
                    "invoice scan exceeded {}s",
                    scan_timeout.as_secs()
                ))),
            }
        }
        .await;

        if let Err(e) = vendor.close(run).await {
            warn!(vendor = %vendor_id, "Failed to close vendor session: {}", e);
        }
        Ok(result?)
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
