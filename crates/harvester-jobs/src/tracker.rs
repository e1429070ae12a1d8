//! Per-vendor job tracking with an atomic start gate.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use harvester_vendors::DownloadReport;
use tracing::debug;

use crate::error::JobConflict;
use crate::record::JobRecord;

/// Holds one [`JobRecord`] per vendor.
pub trait JobTracker: Send + Sync {
    /// Mark the vendor running unless it already is. Check and set are one
    /// atomic step, so concurrent callers see exactly one winner.
    fn try_start(&self, vendor_id: &str) -> Result<JobRecord, JobConflict>;

    fn complete(&self, vendor_id: &str, report: &DownloadReport);

    fn fail(&self, vendor_id: &str, error: String);

    fn get(&self, vendor_id: &str) -> Option<JobRecord>;

    /// Every tracked record, sorted by vendor id.
    fn all(&self) -> Vec<JobRecord>;
}

/// In-process tracker backed by a `DashMap`.
pub struct MemoryJobTracker {
    jobs: DashMap<String, JobRecord>,
}

impl MemoryJobTracker {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }
}

impl Default for MemoryJobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker for MemoryJobTracker {
    fn try_start(&self, vendor_id: &str) -> Result<JobRecord, JobConflict> {
        let record = JobRecord::running(vendor_id);
        match self.jobs.entry(vendor_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_running() {
                    return Err(JobConflict {
                        vendor_id: vendor_id.to_string(),
                        started_at: entry.get().started_at.unwrap_or_default(),
                    });
                }
                entry.insert(record.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
            }
        }
        debug!(vendor = %vendor_id, "Job marked running");
        Ok(record)
    }

    fn complete(&self, vendor_id: &str, report: &DownloadReport) {
        self.jobs
            .entry(vendor_id.to_string())
            .or_insert_with(|| JobRecord::running(vendor_id))
            .finish_completed(report);
    }

    fn fail(&self, vendor_id: &str, error: String) {
        self.jobs
            .entry(vendor_id.to_string())
            .or_insert_with(|| JobRecord::running(vendor_id))
            .finish_failed(error);
    }

    fn get(&self, vendor_id: &str) -> Option<JobRecord> {
        self.jobs.get(vendor_id).map(|r| r.value().clone())
    }

    fn all(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.vendor_id.cmp(&b.vendor_id));
        records
    }
}
