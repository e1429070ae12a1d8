use super::*;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.jobs.default_limit, 10);
    assert_eq!(config.jobs.scan_timeout_seconds, 600);
    assert!(config.vendors.is_empty());
}

#[test]
fn test_default_strategies_order() {
    let browser = BrowserConfig::default();
    assert_eq!(
        browser.strategies,
        vec!["persistent_profile", "system_cdp", "managed"]
    );
    assert!(!browser.headless);
}

#[test]
fn test_paths_resolve_defaults() {
    let paths = PathsConfig {
        data_dir: "/srv/harvester".to_string(),
        ..Default::default()
    };
    let resolved = paths.resolve();
    assert_eq!(resolved.downloads_dir, std::path::PathBuf::from("/srv/harvester/downloads"));
    assert_eq!(resolved.sessions_dir, std::path::PathBuf::from("/srv/harvester/sessions"));
    assert_eq!(
        resolved.credentials_file,
        std::path::PathBuf::from("/srv/harvester/credentials.toml")
    );
    assert_eq!(resolved.logs_dir, std::path::PathBuf::from("/srv/harvester/logs"));
}

#[test]
fn test_paths_resolve_override() {
    let paths = PathsConfig {
        data_dir: "/srv/harvester".to_string(),
        downloads_dir: Some("/mnt/invoices".to_string()),
        ..Default::default()
    };
    let resolved = paths.resolve();
    assert_eq!(resolved.downloads_dir, std::path::PathBuf::from("/mnt/invoices"));
    assert_eq!(resolved.metadata_dir, std::path::PathBuf::from("/srv/harvester/metadata"));
}

#[test]
fn test_vendor_config_default_enabled() {
    let vendor: VendorConfig = toml::from_str("").unwrap();
    assert!(vendor.enabled);
    assert!(vendor.selectors.captcha.is_empty());
}

#[test]
fn test_config_serialization_roundtrip() {
    let mut config = Config::default();
    config.vendors.insert(
        "acme".to_string(),
        VendorConfig {
            login_url: Some("https://billing.acme.test/login".to_string()),
            ..Default::default()
        },
    );
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(
        parsed.vendors["acme"].login_url.as_deref(),
        Some("https://billing.acme.test/login")
    );
}
