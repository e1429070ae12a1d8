//! Job orchestration for Invoice Harvester.
//!
//! One job per vendor at a time: [`JobTracker::try_start`] is the only gate.
//! A started job runs `initialize -> login -> download_invoices -> close`
//! on its own tokio task and leaves a [`JobRecord`] behind.

pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod record;
pub mod tracker;

pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{CredentialError, JobConflict, JobError, OrchestratorError};
pub use orchestrator::{BatchStart, Orchestrator, OrchestratorConfig};
pub use record::{JobRecord, JobStatus};
pub use tracker::{JobTracker, MemoryJobTracker};
