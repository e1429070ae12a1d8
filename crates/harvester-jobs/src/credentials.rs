//! Vendor credential sources.
//!
//! The file store reads a TOML document shaped like
//!
//! ```toml
//! [vendors.amazon]
//! username = "buyer@example.com"
//! password = "${AMAZON_PASSWORD}"
//! totp_secret = "${AMAZON_TOTP}"
//!
//! [vendors.acme.extra]
//! customer_number = "C-1001"
//! ```
//!
//! `${VAR}` references are expanded from the environment on every read, so
//! secrets can stay out of the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harvester_config::{ConfigError, ConfigLoader};
use harvester_vendors::Credential;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::CredentialError;

/// Source of vendor credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self, vendor_id: &str) -> Result<Option<Credential>, CredentialError>;

    async fn get_all_credentials(&self) -> Result<BTreeMap<String, Credential>, CredentialError>;
}

/// In-memory credentials for testing.
pub struct MemoryCredentialStore {
    credentials: RwLock<BTreeMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn insert(&self, vendor_id: &str, credential: Credential) {
        self.credentials
            .write()
            .await
            .insert(vendor_id.to_string(), credential);
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_credential(&self, vendor_id: &str) -> Result<Option<Credential>, CredentialError> {
        Ok(self.credentials.read().await.get(vendor_id).cloned())
    }

    async fn get_all_credentials(&self) -> Result<BTreeMap<String, Credential>, CredentialError> {
        Ok(self.credentials.read().await.clone())
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    vendors: BTreeMap<String, Credential>,
}

/// Credentials read from a TOML file. A missing file means no credentials.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<BTreeMap<String, Credential>, CredentialError> {
        let path = self.path.display().to_string();
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path, "No credentials file");
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(CredentialError::Io {
                    path,
                    message: e.to_string(),
                });
            }
        };

        let expanded = ConfigLoader::expand_env_vars(&content).map_err(|e| match e {
            ConfigError::EnvVarNotSet(var) => CredentialError::EnvVarNotSet(var),
            other => CredentialError::Parse {
                path: path.clone(),
                message: other.to_string(),
            },
        })?;

        // toml's Display quotes the offending line; only the message is safe.
        let parsed: CredentialsFile =
            toml::from_str(&expanded).map_err(|e| CredentialError::Parse {
                path,
                message: e.message().to_string(),
            })?;
        Ok(parsed.vendors)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get_credential(&self, vendor_id: &str) -> Result<Option<Credential>, CredentialError> {
        Ok(self.read().await?.remove(vendor_id))
    }

    async fn get_all_credentials(&self) -> Result<BTreeMap<String, Credential>, CredentialError> {
        self.read().await
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
