use std::time::Duration;

use harvester_browser::SessionStore;

use super::*;
use crate::storage::MemoryLedger;
use crate::testing::{FakeProvider, FakeSite};

fn fast_timings() -> LoginTimings {
    LoginTimings {
        selector_timeout: Duration::from_millis(100),
        confirm_grace: Duration::from_millis(100),
        poll_interval: Duration::from_millis(5),
    }
}

struct Harness {
    provider: Arc<FakeProvider>,
    vendor: ScriptedVendor,
    ledger: Arc<MemoryLedger>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(site: FakeSite) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = site.descriptor();
        let provider = Arc::new(FakeProvider::new().with_site(&descriptor.id, site));
        let ledger = Arc::new(MemoryLedger::new());
        let services = VendorServices::new(
            provider.clone(),
            ledger.clone(),
            Arc::new(ArtifactStore::new(dir.path().join("downloads"))),
        )
        .with_login_timings(fast_timings())
        .with_screenshots_dir(dir.path().join("screenshots"));

        Self {
            provider,
            vendor: ScriptedVendor::new(descriptor, Arc::new(services)),
            ledger,
            _dir: dir,
        }
    }
}

fn credential() -> Credential {
    Credential::new(FakeSite::USERNAME, FakeSite::PASSWORD)
}

#[tokio::test]
async fn test_full_run() {
    let h = Harness::new(FakeSite::new(VendorDescriptor::amazon()).with_invoices(4));

    let mut run = h.vendor.initialize().await.unwrap();
    let outcome = h.vendor.login(&mut run, &credential()).await.unwrap();
    assert!(!outcome.restored);
    assert!(run.authenticated);

    let options = RunOptions {
        limit: Some(3),
        from_date: None,
    };
    let report = h.vendor.download_invoices(&mut run, &options).await.unwrap();
    assert_eq!(report.downloaded, 3);

    h.vendor.close(run).await.unwrap();
    assert_eq!(h.provider.closed(), 1);
    assert!(h.provider.live_profiles().await.is_empty());
    assert_eq!(h.ledger.list_by_vendor("amazon").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_session_restored_on_next_run() {
    let site = FakeSite::new(VendorDescriptor::amazon()).with_invoices(1);
    let h = Harness::new(site.clone());

    let mut run = h.vendor.initialize().await.unwrap();
    h.vendor.login(&mut run, &credential()).await.unwrap();
    h.vendor.close(run).await.unwrap();
    assert!(h.provider.store().load("amazon").await.unwrap().is_some());

    let mut run = h.vendor.initialize().await.unwrap();
    let outcome = h.vendor.login(&mut run, &credential()).await.unwrap();
    assert!(outcome.restored);
    h.vendor.close(run).await.unwrap();
}

#[tokio::test]
async fn test_download_requires_login() {
    let h = Harness::new(FakeSite::new(VendorDescriptor::amazon()).with_invoices(1));

    let mut run = h.vendor.initialize().await.unwrap();
    let err = h
        .vendor
        .download_invoices(&mut run, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VendorError::Extraction(_)));
    h.vendor.close(run).await.unwrap();
}

#[tokio::test]
async fn test_initialize_without_browser() {
    let services = VendorServices::new(
        Arc::new(FakeProvider::new().unavailable()),
        Arc::new(MemoryLedger::new()),
        Arc::new(ArtifactStore::new(std::env::temp_dir())),
    );
    let vendor = ScriptedVendor::new(VendorDescriptor::amazon(), Arc::new(services));

    let err = vendor.initialize().await.err().unwrap();
    assert!(matches!(
        err,
        VendorError::Browser(harvester_browser::BrowserError::LaunchChainExhausted(_))
    ));
}

#[test]
fn test_run_options_deserialize() {
    let options: RunOptions =
        serde_json::from_str(r#"{"limit": 5, "fromDate": "2024-01-01"}"#).unwrap();
    assert_eq!(options.limit, Some(5));
    assert_eq!(options.from_date, NaiveDate::from_ymd_opt(2024, 1, 1));

    let empty: RunOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, RunOptions::default());
}
