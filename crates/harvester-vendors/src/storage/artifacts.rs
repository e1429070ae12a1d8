//! Downloaded invoice files under the downloads root.

use std::path::{Component, Path, PathBuf};

use harvester_browser::fs::write_atomic;
use harvester_browser::session_store::sanitize_id;
use harvester_browser::DownloadedFile;
use tracing::debug;

use crate::error::StorageError;

/// Writes artifacts to `<root>/<vendor>/<invoice number>.<ext>` and resolves
/// relative artifact paths back to files without escaping the root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `file` for `invoice_number` and return its path relative to
    /// the root. An existing file of the same name gets a numeric suffix.
    pub async fn store(
        &self,
        vendor_id: &str,
        invoice_number: &str,
        file: &DownloadedFile,
    ) -> Result<String, StorageError> {
        let vendor_dir = sanitize_id(vendor_id);
        let dir = self.root.join(&vendor_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let stem = sanitize_id(invoice_number);
        let ext = extension_for(file);
        let mut name = format!("{}.{}", stem, ext);
        let mut n = 2;
        while tokio::fs::try_exists(dir.join(&name))
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            name = format!("{}-{}.{}", stem, n, ext);
            n += 1;
        }

        let path = dir.join(&name);
        write_atomic(&path, &file.bytes)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        debug!(
            vendor = %vendor_id,
            invoice = %invoice_number,
            path = %path.display(),
            bytes = file.bytes.len(),
            "Stored artifact"
        );
        Ok(format!("{}/{}", vendor_dir, name))
    }

    /// Map a relative artifact path to a file under the root.
    ///
    /// Rejects empty and absolute paths, `..` components, and anything that
    /// resolves (through symlinks) outside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidPath(relative.to_string());

        let path = Path::new(relative);
        if relative.trim().is_empty() || path.is_absolute() {
            return Err(invalid());
        }
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid());
        }

        let joined = self.root.join(path);
        if let (Ok(root), Ok(target)) = (self.root.canonicalize(), joined.canonicalize()) {
            if !target.starts_with(&root) {
                return Err(invalid());
            }
            return Ok(target);
        }
        Ok(joined)
    }
}

fn extension_for(file: &DownloadedFile) -> String {
    let from_name = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());
    if let Some(ext) = from_name {
        return ext;
    }

    let mime = file
        .content_type
        .as_deref()
        .and_then(|c| c.split(';').next())
        .map(|c| c.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("text/html") => "html",
        Some("text/plain") => "txt",
        Some("application/xml") | Some("text/xml") => "xml",
        Some("application/zip") => "zip",
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        _ => "pdf",
    }
    .to_string()
}
