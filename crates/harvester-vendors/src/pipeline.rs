//! Per-invoice detail extraction, dedup and download.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use harvester_browser::{BrowserContext, Page};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::descriptor::VendorDescriptor;
use crate::error::{StorageError, VendorError};
use crate::extract::{extract_details, InvoiceCandidate};
use crate::record::InvoiceRecord;
use crate::storage::{ArtifactStore, MetadataLedger};

/// Counts for one download pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Records appended to the ledger during this pass.
    pub records: Vec<InvoiceRecord>,
}

impl DownloadReport {
    pub fn merge(&mut self, other: DownloadReport) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.records.extend(other.records);
    }
}

enum Outcome {
    Downloaded(Box<InvoiceRecord>),
    Skipped(&'static str),
}

/// Downloads candidates into the artifact store and ledger, one tab each.
pub struct DownloadPipeline<'a> {
    context: &'a dyn BrowserContext,
    descriptor: &'a VendorDescriptor,
    ledger: &'a dyn MetadataLedger,
    artifacts: &'a ArtifactStore,
}

impl<'a> DownloadPipeline<'a> {
    pub fn new(
        context: &'a dyn BrowserContext,
        descriptor: &'a VendorDescriptor,
        ledger: &'a dyn MetadataLedger,
        artifacts: &'a ArtifactStore,
    ) -> Self {
        Self {
            context,
            descriptor,
            ledger,
            artifacts,
        }
    }

    /// Process every candidate. A failing candidate is logged, counted and
    /// skipped; it never aborts the pass.
    pub async fn download_all(
        &self,
        candidates: &[InvoiceCandidate],
        from_date: Option<NaiveDate>,
    ) -> DownloadReport {
        let vendor = &self.descriptor.id;
        let mut report = DownloadReport::default();

        for candidate in candidates {
            match self.process(candidate, from_date).await {
                Ok(Outcome::Downloaded(record)) => {
                    info!(
                        vendor = %vendor,
                        invoice = %record.invoice_number,
                        path = %record.storage_path,
                        "Invoice downloaded"
                    );
                    report.downloaded += 1;
                    report.records.push(*record);
                }
                Ok(Outcome::Skipped(reason)) => {
                    debug!(vendor = %vendor, href = %candidate.href, reason, "Invoice skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(
                        vendor = %vendor,
                        position = candidate.position,
                        href = %candidate.href,
                        "Invoice failed: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            vendor = %vendor,
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            "Download pass finished"
        );
        report
    }

    async fn process(
        &self,
        candidate: &InvoiceCandidate,
        from_date: Option<NaiveDate>,
    ) -> Result<Outcome, VendorError> {
        let page = self.context.new_page().await?;
        let result = self.process_on(page.as_ref(), candidate, from_date).await;
        if let Err(e) = page.close().await {
            debug!(vendor = %self.descriptor.id, "Failed to close invoice tab: {}", e);
        }
        result
    }

    async fn process_on(
        &self,
        page: &dyn Page,
        candidate: &InvoiceCandidate,
        from_date: Option<NaiveDate>,
    ) -> Result<Outcome, VendorError> {
        let vendor = &self.descriptor.id;
        page.goto(&candidate.href).await?;

        let details = extract_details(page, self.descriptor, candidate).await?;
        if from_date.is_some_and(|from| details.issue_date < from) {
            return Ok(Outcome::Skipped("issued before start date"));
        }
        if self.ledger.exists(vendor, &details.invoice_number).await? {
            return Ok(Outcome::Skipped("already recorded"));
        }

        let file = page
            .download(
                &self.descriptor.selectors.download_button,
                self.descriptor.download_timeout,
            )
            .await?;
        let storage_path = self
            .artifacts
            .store(vendor, &details.invoice_number, &file)
            .await?;

        let mut extra = BTreeMap::new();
        extra.insert("sourceUrl".to_string(), candidate.href.clone());
        if details.synthetic_number {
            extra.insert("syntheticNumber".to_string(), "true".to_string());
        }

        let record = InvoiceRecord {
            vendor_id: vendor.clone(),
            invoice_number: details.invoice_number,
            issue_date: details.issue_date,
            amount: details.amount,
            currency: details.currency,
            downloaded_at: Utc::now(),
            file_name: file.file_name,
            storage_path,
            extra,
        };

        match self.ledger.append(&record).await {
            Ok(()) => Ok(Outcome::Downloaded(Box::new(record))),
            Err(StorageError::Duplicate { .. }) => {
                // Lost a race with another writer; drop our copy of the file.
                let _ = tokio::fs::remove_file(self.artifacts.root().join(&record.storage_path)).await;
                Ok(Outcome::Skipped("already recorded"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
