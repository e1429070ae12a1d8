//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use harvester_jobs::Orchestrator;
use harvester_vendors::{ArtifactStore, MetadataLedger};

/// State shared across handlers.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub ledger: Arc<dyn MetadataLedger>,
    pub artifacts: Arc<ArtifactStore>,
    start_time: Instant,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        ledger: Arc<dyn MetadataLedger>,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            orchestrator,
            ledger,
            artifacts,
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
