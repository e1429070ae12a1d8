//! The shipped configuration file must load and validate.

use harvester_config::{ConfigLoader, ConfigValidator};

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[test]
fn test_default_config_loads() {
    let config = ConfigLoader::load_str(DEFAULT_CONFIG).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.browser.strategies.len(), 3);
    assert_eq!(config.jobs.scan_timeout_seconds, 600);

    let amazon = &config.vendors["amazon"];
    assert!(amazon.enabled);
    assert_eq!(amazon.auth_timeout_seconds, Some(300));
    assert!(!config.vendors.contains_key("acme"));
}

#[test]
fn test_default_config_validates() {
    let config = ConfigLoader::load_str(DEFAULT_CONFIG).unwrap();
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid(), "{:?}", result.errors);
}

#[test]
fn test_default_data_dir_expands_home() {
    let config = ConfigLoader::load_str(DEFAULT_CONFIG).unwrap();
    let paths = config.paths.resolve();
    assert!(!paths.data_dir.to_string_lossy().starts_with('~'));
    assert_eq!(paths.downloads_dir, paths.data_dir.join("downloads"));
}
