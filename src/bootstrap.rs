//! Wires configuration into the browser manager, stores and orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use harvester_browser::{BrowserManager, BrowserManagerConfig, FileSessionStore, LaunchStrategy};
use harvester_config::{Config, ConfigLoader, ConfigValidator, ResolvedPaths};
use harvester_jobs::{FileCredentialStore, MemoryJobTracker, Orchestrator, OrchestratorConfig};
use harvester_vendors::{
    ArtifactStore, JsonLedger, LoginTimings, MetadataLedger, VendorDescriptor, VendorRegistry,
    VendorServices,
};

/// Fully wired application.
pub(crate) struct App {
    pub config: Config,
    pub paths: ResolvedPaths,
    pub orchestrator: Arc<Orchestrator>,
    pub ledger: Arc<dyn MetadataLedger>,
    pub artifacts: Arc<ArtifactStore>,
}

/// Validate `config` and build every component. Directories are created here.
pub(crate) fn build(config: Config) -> Result<App, Box<dyn std::error::Error>> {
    for warning in ConfigValidator::validate(&config).into_result()? {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    let paths = config.paths.resolve();
    for dir in [
        &paths.downloads_dir,
        &paths.metadata_dir,
        &paths.sessions_dir,
        &paths.profiles_dir,
        &paths.screenshots_dir,
    ] {
        std::fs::create_dir_all(dir)?;
    }

    let browser = Arc::new(BrowserManager::new(
        browser_config(&config, &paths)?,
        Arc::new(FileSessionStore::new(&paths.sessions_dir)),
    ));
    let ledger: Arc<dyn MetadataLedger> = Arc::new(JsonLedger::new(&paths.metadata_dir));
    let artifacts = Arc::new(ArtifactStore::new(&paths.downloads_dir));

    let services = VendorServices::new(browser.clone(), ledger.clone(), artifacts.clone())
        .with_screenshots_dir(&paths.screenshots_dir)
        .with_login_timings(LoginTimings {
            poll_interval: Duration::from_millis(config.jobs.poll_interval_ms.max(1)),
            ..LoginTimings::default()
        });
    let registry = VendorRegistry::from_descriptors(descriptors(&config)?, Arc::new(services))?;
    info!(vendors = ?registry.ids(), "Vendors registered");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(registry),
        Arc::new(MemoryJobTracker::new()),
        Arc::new(FileCredentialStore::new(&paths.credentials_file)),
        browser,
        OrchestratorConfig {
            scan_timeout: Duration::from_secs(config.jobs.scan_timeout_seconds),
        },
    ));

    Ok(App {
        config,
        paths,
        orchestrator,
        ledger,
        artifacts,
    })
}

fn browser_config(
    config: &Config,
    paths: &ResolvedPaths,
) -> Result<BrowserManagerConfig, Box<dyn std::error::Error>> {
    let browser = &config.browser;
    let strategies = browser
        .strategies
        .iter()
        .map(|s| s.parse::<LaunchStrategy>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BrowserManagerConfig {
        chrome_path: browser
            .chrome_path
            .as_deref()
            .map(|p| PathBuf::from(ConfigLoader::expand_path(p))),
        cdp_endpoint: browser.cdp_endpoint.clone(),
        strategies,
        profiles_dir: paths.profiles_dir.clone(),
        downloads_dir: paths.data_dir.join("tmp").join("downloads"),
        headless: browser.headless,
        viewport_width: browser.viewport_width,
        viewport_height: browser.viewport_height,
        launch_timeout: Duration::from_secs(browser.launch_timeout_seconds),
    })
}

/// Vendor descriptors with the global default limit applied where a vendor
/// sets none.
fn descriptors(config: &Config) -> Result<Vec<VendorDescriptor>, Box<dyn std::error::Error>> {
    let mut descriptors = VendorDescriptor::load_all(&config.vendors)?;
    for descriptor in &mut descriptors {
        let own_limit = config
            .vendors
            .get(&descriptor.id)
            .and_then(|v| v.default_limit);
        if own_limit.is_none() {
            descriptor.default_limit = config.jobs.default_limit;
        }
    }
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_config::VendorConfig;

    #[test]
    fn test_global_limit_applies_without_vendor_limit() {
        let mut config = Config::default();
        config.jobs.default_limit = 3;
        config.vendors.insert(
            "amazon".to_string(),
            VendorConfig {
                default_limit: Some(7),
                ..VendorConfig::default()
            },
        );
        let loaded = descriptors(&config).unwrap();
        assert_eq!(loaded[0].default_limit, 7);

        config.vendors.clear();
        let loaded = descriptors(&config).unwrap();
        assert_eq!(loaded[0].default_limit, 3);
    }

    #[test]
    fn test_browser_config_from_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.data_dir = dir.path().display().to_string();
        config.browser.strategies = vec!["system_cdp".to_string(), "managed".to_string()];
        let paths = config.paths.resolve();

        let browser = browser_config(&config, &paths).unwrap();
        assert_eq!(
            browser.strategies,
            vec![LaunchStrategy::SystemCdp, LaunchStrategy::Managed]
        );
        assert_eq!(browser.profiles_dir, dir.path().join("profiles"));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let mut config = Config::default();
        config.browser.strategies = vec!["teleport".to_string()];
        let paths = config.paths.resolve();
        assert!(browser_config(&config, &paths).is_err());
    }

    #[test]
    fn test_build_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.data_dir = dir.path().display().to_string();

        let app = build(config).unwrap();
        assert!(app.paths.downloads_dir.is_dir());
        assert!(app.paths.sessions_dir.is_dir());
        assert!(app.orchestrator.registry().contains("amazon"));
    }
}
