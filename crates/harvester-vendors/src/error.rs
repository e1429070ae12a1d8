//! Vendor automation error types.

use harvester_browser::BrowserError;
use thiserror::Error;

use crate::login::LoginPhase;

/// Artifact and ledger errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invoice {invoice_number} already recorded for {vendor}")]
    Duplicate {
        vendor: String,
        invoice_number: String,
    },

    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, e: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Errors raised while automating a vendor.
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("Login failed for {vendor} during {phase}: {reason}")]
    LoginFailed {
        vendor: String,
        phase: LoginPhase,
        reason: String,
    },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid vendor definition '{vendor}': {message}")]
    InvalidDescriptor { vendor: String, message: String },

    #[error("Vendor already registered: {0}")]
    AlreadyRegistered(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failed_display() {
        let err = VendorError::LoginFailed {
            vendor: "amazon".to_string(),
            phase: LoginPhase::WaitingForManualCompletion,
            reason: "timeout after 5s".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Login failed for amazon during waiting_for_manual_completion: timeout after 5s"
        );
    }

    #[test]
    fn test_duplicate_display() {
        let err = StorageError::Duplicate {
            vendor: "amazon".to_string(),
            invoice_number: "INV-1".to_string(),
        };
        assert_eq!(err.to_string(), "Invoice INV-1 already recorded for amazon");
    }

    #[test]
    fn test_storage_converts_to_vendor_error() {
        let err: VendorError = StorageError::InvalidPath("../x".to_string()).into();
        assert!(matches!(err, VendorError::Storage(StorageError::InvalidPath(_))));
    }
}
