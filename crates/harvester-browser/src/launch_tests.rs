use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

#[test]
fn test_strategy_names_round_trip() {
    for strategy in LaunchStrategy::ALL {
        let parsed: LaunchStrategy = strategy.as_str().parse().unwrap();
        assert_eq!(parsed, strategy);
    }
    assert_eq!(
        "Persistent-Profile".parse::<LaunchStrategy>().unwrap(),
        LaunchStrategy::PersistentProfile
    );
    assert!("firefox".parse::<LaunchStrategy>().is_err());
}

#[test]
fn test_strategy_serde_matches_display() {
    let json = serde_json::to_string(&LaunchStrategy::SystemCdp).unwrap();
    assert_eq!(json, "\"system_cdp\"");
}

#[test]
fn test_browser_keys() {
    assert_eq!(
        LaunchStrategy::PersistentProfile.browser_key("amazon"),
        "profile:amazon"
    );
    assert_eq!(LaunchStrategy::SystemCdp.browser_key("amazon"), "system");
    assert_eq!(LaunchStrategy::Managed.browser_key("acme"), "managed");
}

#[test]
fn test_only_shared_browsers_isolate() {
    assert!(!LaunchStrategy::PersistentProfile.isolates_context());
    assert!(LaunchStrategy::SystemCdp.isolates_context());
    assert!(LaunchStrategy::Managed.isolates_context());
}

#[test]
fn test_parse_devtools_active_port() {
    assert_eq!(
        parse_devtools_active_port("41235\n/devtools/browser/6f2c\n"),
        Some(41235)
    );
    assert_eq!(parse_devtools_active_port(""), None);
    assert_eq!(parse_devtools_active_port("not-a-port\n"), None);
}

#[test]
fn test_configured_chrome_must_exist() {
    let err = find_chrome(Some(Path::new("/definitely/not/chrome"))).unwrap_err();
    assert!(matches!(err, BrowserError::LaunchFailed(_)));
}

#[tokio::test]
async fn test_chain_returns_first_success() {
    let calls = AtomicUsize::new(0);
    let result = run_chain(&LaunchStrategy::ALL, |strategy| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            match strategy {
                LaunchStrategy::PersistentProfile => {
                    Err(BrowserError::LaunchFailed("profile locked".to_string()))
                }
                other => Ok(other.as_str()),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(result, (LaunchStrategy::SystemCdp, "system_cdp"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_chain_exhaustion_reports_every_failure() {
    let err = run_chain(&LaunchStrategy::ALL, |strategy| async move {
        Err::<(), _>(BrowserError::LaunchFailed(format!("{} broke", strategy)))
    })
    .await
    .unwrap_err();

    let BrowserError::LaunchChainExhausted(failures) = &err else {
        panic!("unexpected error: {err}");
    };
    let strategies: Vec<_> = failures.iter().map(|f| f.strategy).collect();
    assert_eq!(strategies, LaunchStrategy::ALL.to_vec());
    assert!(failures[2].error.contains("managed broke"));

    let message = err.to_string();
    assert!(message.contains("persistent_profile"));
    assert!(message.contains("system_cdp"));
    assert!(message.contains("managed"));
}

#[tokio::test]
async fn test_empty_chain_is_exhausted() {
    let err = run_chain(&[], |_| async { Ok::<_, BrowserError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::LaunchChainExhausted(ref f) if f.is_empty()));
}
