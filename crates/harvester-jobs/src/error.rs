//! Job orchestration errors.

use chrono::{DateTime, Utc};
use harvester_vendors::VendorError;
use thiserror::Error;

/// A job for the vendor is already running.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("A job for {vendor_id} is already running (started {started_at})")]
pub struct JobConflict {
    pub vendor_id: String,
    pub started_at: DateTime<Utc>,
}

/// Credential store errors. Messages never quote file contents.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read credentials from {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid credentials file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),
}

/// Why a started job ended in `failed`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("no credentials configured for {0}")]
    NoCredentials(String),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Vendor(#[from] VendorError),
}

/// Errors returned to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Unknown vendor: {0}")]
    UnknownVendor(String),

    #[error(transparent)]
    Conflict(#[from] JobConflict),
}
