//! On-disk layout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::ConfigLoader;

/// Directory layout. Unset entries derive from `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshots_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            downloads_dir: None,
            metadata_dir: None,
            sessions_dir: None,
            profiles_dir: None,
            screenshots_dir: None,
            credentials_file: None,
        }
    }
}

fn default_data_dir() -> String {
    dirs::home_dir()
        .map(|h| h.join(".invoice-harvester").display().to_string())
        .unwrap_or_else(|| ".invoice-harvester".to_string())
}

/// Fully resolved directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub data_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub credentials_file: PathBuf,
}

impl PathsConfig {
    /// Resolve `~` and fill unset directories below `data_dir`.
    pub fn resolve(&self) -> ResolvedPaths {
        let data_dir = PathBuf::from(ConfigLoader::expand_path(&self.data_dir));
        let pick = |value: &Option<String>, default: &str| -> PathBuf {
            value
                .as_deref()
                .map(|v| PathBuf::from(ConfigLoader::expand_path(v)))
                .unwrap_or_else(|| data_dir.join(default))
        };

        ResolvedPaths {
            downloads_dir: pick(&self.downloads_dir, "downloads"),
            metadata_dir: pick(&self.metadata_dir, "metadata"),
            sessions_dir: pick(&self.sessions_dir, "sessions"),
            profiles_dir: pick(&self.profiles_dir, "profiles"),
            screenshots_dir: pick(&self.screenshots_dir, "screenshots"),
            credentials_file: pick(&self.credentials_file, "credentials.toml"),
            logs_dir: data_dir.join("logs"),
            data_dir,
        }
    }
}
