//! Job status records.

use std::fmt;

use chrono::{DateTime, Utc};
use harvester_vendors::DownloadReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::NotStarted => "not_started",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Latest job state of one vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub vendor_id: String,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub download_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    pub fn not_started(vendor_id: &str) -> Self {
        Self {
            vendor_id: vendor_id.to_string(),
            status: JobStatus::NotStarted,
            started_at: None,
            finished_at: None,
            download_count: 0,
            skipped_count: 0,
            failed_count: 0,
            error: None,
        }
    }

    pub fn running(vendor_id: &str) -> Self {
        Self {
            status: JobStatus::Running,
            started_at: Some(Utc::now()),
            ..Self::not_started(vendor_id)
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub(crate) fn finish_completed(&mut self, report: &DownloadReport) {
        self.status = JobStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.download_count = report.downloaded;
        self.skipped_count = report.skipped;
        self.failed_count = report.failed;
        self.error = None;
    }

    pub(crate) fn finish_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}
