//! Durable per-profile session state.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::fs::write_atomic;
use crate::state::SessionState;

/// Session store errors.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Failed to load session '{profile}': {reason}")]
    Load { profile: String, reason: String },

    #[error("Failed to save session '{profile}': {reason}")]
    Save { profile: String, reason: String },
}

/// Persists [`SessionState`] per profile id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the stored state; `Ok(None)` when nothing was saved yet.
    async fn load(&self, profile_id: &str) -> Result<Option<SessionState>, SessionStoreError>;

    /// Replace the stored state.
    async fn save(&self, profile_id: &str, state: &SessionState) -> Result<(), SessionStoreError>;
}

/// One JSON file per profile under a directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing `profile_id`.
    pub fn path_for(&self, profile_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_id(profile_id)))
    }
}

/// Map a profile id onto a safe file stem.
pub fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, profile_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        let path = self.path_for(profile_id);
        let content = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionStoreError::Load {
                    profile: profile_id.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let state = serde_json::from_slice(&content).map_err(|e| SessionStoreError::Load {
            profile: profile_id.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        debug!(profile = profile_id, "Loaded session state");
        Ok(Some(state))
    }

    async fn save(&self, profile_id: &str, state: &SessionState) -> Result<(), SessionStoreError> {
        let save_err = |reason: String| SessionStoreError::Save {
            profile: profile_id.to_string(),
            reason,
        };
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| save_err(e.to_string()))?;
        write_atomic(&self.path_for(profile_id), &bytes)
            .await
            .map_err(|e| save_err(e.to_string()))?;
        debug!(
            profile = profile_id,
            cookies = state.cookies.len(),
            origins = state.origins.len(),
            "Saved session state"
        );
        Ok(())
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemorySessionStore {
    states: RwLock<HashMap<String, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, profile_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        Ok(self.states.read().get(profile_id).cloned())
    }

    async fn save(&self, profile_id: &str, state: &SessionState) -> Result<(), SessionStoreError> {
        self.states
            .write()
            .insert(profile_id.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
