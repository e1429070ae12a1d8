//! Append-only invoice metadata ledger.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harvester_browser::fs::write_atomic;
use harvester_browser::session_store::sanitize_id;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::StorageError;
use crate::record::InvoiceRecord;

/// Invoice metadata store. `(vendor_id, invoice_number)` is unique.
#[async_trait]
pub trait MetadataLedger: Send + Sync {
    /// Append a record, rejecting a duplicate key with [`StorageError::Duplicate`].
    async fn append(&self, record: &InvoiceRecord) -> Result<(), StorageError>;

    /// Records of one vendor in append order.
    async fn list_by_vendor(&self, vendor_id: &str) -> Result<Vec<InvoiceRecord>, StorageError>;

    /// Every record, grouped by vendor id.
    async fn list_all(&self) -> Result<Vec<InvoiceRecord>, StorageError>;

    async fn exists(&self, vendor_id: &str, invoice_number: &str) -> Result<bool, StorageError>;
}

/// In-memory ledger for testing.
pub struct MemoryLedger {
    records: RwLock<HashMap<String, Vec<InvoiceRecord>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataLedger for MemoryLedger {
    async fn append(&self, record: &InvoiceRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        let vendor = records.entry(record.vendor_id.clone()).or_default();
        if vendor
            .iter()
            .any(|r| r.invoice_number == record.invoice_number)
        {
            return Err(duplicate(record));
        }
        vendor.push(record.clone());
        Ok(())
    }

    async fn list_by_vendor(&self, vendor_id: &str) -> Result<Vec<InvoiceRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(vendor_id).cloned().unwrap_or_default())
    }

    async fn list_all(&self) -> Result<Vec<InvoiceRecord>, StorageError> {
        let records = self.records.read().await;
        let mut vendors: Vec<_> = records.keys().collect();
        vendors.sort();
        Ok(vendors
            .into_iter()
            .flat_map(|v| records[v].iter().cloned())
            .collect())
    }

    async fn exists(&self, vendor_id: &str, invoice_number: &str) -> Result<bool, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .get(vendor_id)
            .is_some_and(|v| v.iter().any(|r| r.invoice_number == invoice_number)))
    }
}

/// File ledger: one JSON array per vendor.
///
/// ```text
/// {dir}/
/// ├── amazon.json
/// └── {vendor_id}.json
/// ```
///
/// Every append rewrites the vendor's file atomically. Writers are
/// serialised by an async mutex so concurrent jobs never interleave.
pub struct JsonLedger {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, vendor_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_id(vendor_id)))
    }

    async fn read_file(path: &Path) -> Result<Vec<InvoiceRecord>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}

#[async_trait]
impl MetadataLedger for JsonLedger {
    async fn append(&self, record: &InvoiceRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let path = self.path_for(&record.vendor_id);
        let mut records = Self::read_file(&path).await?;
        if records
            .iter()
            .any(|r| r.invoice_number == record.invoice_number)
        {
            return Err(duplicate(record));
        }
        records.push(record.clone());

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;
        let json = serde_json::to_vec_pretty(&records)?;
        write_atomic(&path, &json)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        debug!(
            vendor = %record.vendor_id,
            invoice = %record.invoice_number,
            total = records.len(),
            "Ledger record appended"
        );
        Ok(())
    }

    async fn list_by_vendor(&self, vendor_id: &str) -> Result<Vec<InvoiceRecord>, StorageError> {
        Self::read_file(&self.path_for(vendor_id)).await
    }

    async fn list_all(&self) -> Result<Vec<InvoiceRecord>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut records = Vec::new();
        for path in files {
            records.extend(Self::read_file(&path).await?);
        }
        Ok(records)
    }

    async fn exists(&self, vendor_id: &str, invoice_number: &str) -> Result<bool, StorageError> {
        Ok(self
            .list_by_vendor(vendor_id)
            .await?
            .iter()
            .any(|r| r.invoice_number == invoice_number))
    }
}

fn duplicate(record: &InvoiceRecord) -> StorageError {
    StorageError::Duplicate {
        vendor: record.vendor_id.clone(),
        invoice_number: record.invoice_number.clone(),
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
