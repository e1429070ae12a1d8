//! Invoice metadata records.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One downloaded invoice. Unique per `(vendor_id, invoice_number)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub vendor_id: String,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub amount: f64,
    pub currency: String,
    pub downloaded_at: DateTime<Utc>,
    pub file_name: String,
    /// Path relative to the downloads root.
    pub storage_path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl InvoiceRecord {
    /// Dedup key.
    pub fn key(&self) -> (&str, &str) {
        (&self.vendor_id, &self.invoice_number)
    }
}
