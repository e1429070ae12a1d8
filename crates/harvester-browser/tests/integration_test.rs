//! Integration tests against a real Chrome.
//!
//! Ignored by default. Run with:
//! cargo test -p harvester-browser --test integration_test -- --ignored --nocapture

use std::sync::Arc;
use std::time::Duration;

use harvester_browser::launch::find_chrome;
use harvester_browser::{
    BrowserManager, BrowserManagerConfig, BrowserState, ContextOptions, ContextProvider,
    LaunchStrategy, MemorySessionStore, SessionStore,
};
use tempfile::TempDir;

const LISTING: &str = "data:text/html,<html><body>\
    <input id='q' value='old'>\
    <table><tr class='row'><td>INV-1</td><td><a class='inv' href='https://example.com/1.pdf'>pdf</a></td></tr>\
    <tr class='row'><td>INV-2</td><td>no link</td></tr></table>\
    <select id='year'><option value='2023'>2023</option><option value='2024'>2024</option></select>\
    </body></html>";

fn test_config(dir: &TempDir) -> BrowserManagerConfig {
    BrowserManagerConfig {
        strategies: vec![LaunchStrategy::Managed],
        profiles_dir: dir.path().join("profiles"),
        downloads_dir: dir.path().join("downloads"),
        headless: true,
        ..BrowserManagerConfig::default()
    }
}

#[test]
#[ignore = "requires Chrome"]
fn test_chrome_detection() {
    let path = find_chrome(None).expect("Chrome should be installed on the system");
    println!("Found Chrome at: {}", path.display());
    assert!(path.exists());
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_page_operations() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemorySessionStore::new());
    let manager = BrowserManager::new(test_config(&dir), store.clone());

    let context = manager
        .acquire_context("integration", &ContextOptions::default())
        .await
        .expect("managed launch should succeed");
    assert_eq!(manager.browser_state("integration").await, BrowserState::Ready);

    let page = context.new_page().await.unwrap();
    page.goto(LISTING).await.unwrap();

    assert!(page.exists("#q").await.unwrap());
    assert!(!page.exists("#missing").await.unwrap());
    assert!(page.wait_for("table", Duration::from_secs(2)).await.unwrap());

    page.fill("#q", "new value").await.unwrap();
    assert_eq!(
        page.attribute_of("#q", "value").await.unwrap().as_deref(),
        Some("new value")
    );

    let rows = page.rows("tr.row", "a.inv").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].href.as_deref(), Some("https://example.com/1.pdf"));
    assert!(rows[1].href.is_none());
    assert!(rows[1].text.contains("INV-2"));

    page.select_option("#year", "2024").await.unwrap();
    assert_eq!(
        page.evaluate("document.querySelector('#year').value").await.unwrap(),
        "2024"
    );

    // alert() would block the page without the dialog pump.
    page.evaluate("alert('hello'); 1").await.unwrap();

    let png = page.screenshot_png().await.unwrap();
    assert_eq!(&png[1..4], b"PNG");

    page.close().await.unwrap();
    manager.close("integration").await.unwrap();

    assert!(store.load("integration").await.unwrap().is_some());
    assert!(manager.live_profiles().await.is_empty());
    manager.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_acquire_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let manager = BrowserManager::new(test_config(&dir), Arc::new(MemorySessionStore::new()));

    let first = manager
        .acquire_context("idem", &ContextOptions::default())
        .await
        .unwrap();
    let second = manager
        .acquire_context("idem", &ContextOptions::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    manager.shutdown().await;
}
