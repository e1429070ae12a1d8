use std::sync::Arc;

use harvester_browser::MemorySessionStore;

use super::*;
use crate::extract::scan;
use crate::storage::MemoryLedger;
use crate::testing::{FakeContext, FakeSite};

struct Harness {
    site: FakeSite,
    context: FakeContext,
    descriptor: VendorDescriptor,
    ledger: MemoryLedger,
    artifacts: ArtifactStore,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(site: FakeSite) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            descriptor: site.descriptor(),
            context: FakeContext::new("amazon", site.clone(), Arc::new(MemorySessionStore::new())),
            site,
            ledger: MemoryLedger::new(),
            artifacts: ArtifactStore::new(dir.path()),
            _dir: dir,
        }
    }

    async fn candidates(&self) -> Vec<InvoiceCandidate> {
        let page = self.context.new_page().await.unwrap();
        page.goto(&self.descriptor.invoice_list_url).await.unwrap();
        let result = scan(page.as_ref(), &self.descriptor, 10, None).await.unwrap();
        page.close().await.unwrap();
        result.candidates
    }

    async fn run(&self, from_date: Option<NaiveDate>) -> DownloadReport {
        let candidates = self.candidates().await;
        DownloadPipeline::new(&self.context, &self.descriptor, &self.ledger, &self.artifacts)
            .download_all(&candidates, from_date)
            .await
    }
}

fn site() -> FakeSite {
    FakeSite::new(VendorDescriptor::amazon())
        .with_invoice("112-0000001", "January 10, 2024", "$10.00")
        .with_invoice("112-0000002", "February 10, 2024", "$20.50")
        .with_invoice("112-0000003", "March 10, 2024", "$1,030.00")
        .logged_in()
}

#[tokio::test]
async fn test_downloads_every_new_invoice() {
    let h = Harness::new(site());

    let report = h.run(None).await;
    assert_eq!((report.downloaded, report.skipped, report.failed), (3, 0, 0));
    assert_eq!(h.site.downloads(), 3);

    let record = &report.records[2];
    assert_eq!(record.invoice_number, "112-0000003");
    assert_eq!(record.amount, 1030.0);
    assert_eq!(record.currency, "USD");
    assert_eq!(record.issue_date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    assert_eq!(record.storage_path, "amazon/112-0000003.pdf");
    assert_eq!(record.extra["sourceUrl"], "https://vendor.test/invoice/2");
    assert!(h.artifacts.resolve(&record.storage_path).unwrap().exists());

    assert_eq!(h.ledger.list_by_vendor("amazon").await.unwrap().len(), 3);
    assert_eq!(h.context.open_pages(), 0);
}

#[tokio::test]
async fn test_second_run_skips_recorded_invoices() {
    let h = Harness::new(site());
    h.run(None).await;

    let report = h.run(None).await;
    assert_eq!((report.downloaded, report.skipped, report.failed), (0, 3, 0));
    assert_eq!(h.site.downloads(), 3);
}

#[tokio::test]
async fn test_failed_download_does_not_stop_the_pass() {
    let h = Harness::new(site().failing_download("112-0000002"));

    let report = h.run(None).await;
    assert_eq!((report.downloaded, report.skipped, report.failed), (2, 0, 1));
    assert!(!h.ledger.exists("amazon", "112-0000002").await.unwrap());
    assert_eq!(h.context.open_pages(), 0);
}

#[tokio::test]
async fn test_skips_invoices_before_start_date() {
    let h = Harness::new(site());

    let report = h.run(NaiveDate::from_ymd_opt(2024, 2, 1)).await;
    assert_eq!((report.downloaded, report.skipped, report.failed), (2, 1, 0));
    assert!(!h.ledger.exists("amazon", "112-0000001").await.unwrap());
}

#[test]
fn test_report_merge() {
    let mut total = DownloadReport {
        downloaded: 1,
        skipped: 2,
        failed: 0,
        records: Vec::new(),
    };
    total.merge(DownloadReport {
        downloaded: 3,
        skipped: 0,
        failed: 1,
        records: Vec::new(),
    });
    assert_eq!((total.downloaded, total.skipped, total.failed), (4, 2, 1));
}
