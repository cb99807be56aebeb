//! Download capabilities: temporary blob registry, file-save sinks and the
//! identifier source used for fallback file names.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::conf::C_OBJECT_URL_SCHEME;
use crate::spec::{ExcelExportError, SpecBlob};

////////////////////////////////////////////////////////////////////////////////
// #region BlobRegistry

/// Registry handing out temporary object URLs for blobs.
pub trait BlobRegistry {
    /// Register `blob` and return its object URL.
    fn create_object_url(&self, blob: SpecBlob) -> String;
    /// Look up a registered blob.
    fn fetch(&self, url: &str) -> Option<Arc<SpecBlob>>;
    /// Release `url`. Unknown URLs are ignored.
    fn revoke_object_url(&self, url: &str);
}

/// Scoped object URL; revoked when dropped.
pub struct ObjectUrlGuard<'a> {
    url: String,
    registry: &'a dyn BlobRegistry,
}

impl<'a> ObjectUrlGuard<'a> {
    /// Register `blob` with `registry` for the lifetime of the guard.
    pub fn create(registry: &'a dyn BlobRegistry, blob: SpecBlob) -> Self {
        let url = registry.create_object_url(blob);
        Self { url, registry }
    }

    /// Object URL held by this guard.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrlGuard<'_> {
    fn drop(&mut self) {
        self.registry.revoke_object_url(&self.url);
        debug!(url = %self.url, "object url revoked");
    }
}

/// In-process blob registry issuing `blob:<uuid>` URLs.
#[derive(Debug, Default)]
pub struct MemoryBlobRegistry {
    dict_blobs: Mutex<BTreeMap<String, Arc<SpecBlob>>>,
}

impl MemoryBlobRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of URLs currently registered.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no URL is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<SpecBlob>>> {
        self.dict_blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobRegistry for MemoryBlobRegistry {
    fn create_object_url(&self, blob: SpecBlob) -> String {
        let url = format!("{C_OBJECT_URL_SCHEME}{}", Uuid::new_v4());
        self.lock().insert(url.clone(), Arc::new(blob));
        url
    }

    fn fetch(&self, url: &str) -> Option<Arc<SpecBlob>> {
        self.lock().get(url).cloned()
    }

    fn revoke_object_url(&self, url: &str) {
        self.lock().remove(url);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileSaveSink

/// Save action for a registered blob.
pub trait FileSaveSink {
    /// Offer the blob behind `url` for saving as `file_name`.
    fn save(
        &self,
        registry: &dyn BlobRegistry,
        url: &str,
        file_name: &str,
    ) -> Result<(), ExcelExportError>;
}

fn fetch_blob(registry: &dyn BlobRegistry, url: &str) -> Result<Arc<SpecBlob>, ExcelExportError> {
    registry
        .fetch(url)
        .ok_or_else(|| ExcelExportError::BlobNotFound(url.to_string()))
}

/// Sink writing each saved file into a fixed directory.
#[derive(Debug, Clone)]
pub struct DirectorySaveSink {
    path_dir_out: PathBuf,
}

impl DirectorySaveSink {
    /// Sink saving into `path_dir_out`, which must exist.
    pub fn new(path_dir_out: impl Into<PathBuf>) -> Self {
        Self {
            path_dir_out: path_dir_out.into(),
        }
    }

    /// Target directory.
    pub fn dir_out(&self) -> &Path {
        &self.path_dir_out
    }
}

impl FileSaveSink for DirectorySaveSink {
    fn save(
        &self,
        registry: &dyn BlobRegistry,
        url: &str,
        file_name: &str,
    ) -> Result<(), ExcelExportError> {
        let blob = fetch_blob(registry, url)?;
        let path_file_out = self.path_dir_out.join(file_name);
        fs::write(&path_file_out, &blob.bytes).map_err(|source| ExcelExportError::Save {
            file_name: file_name.to_string(),
            source,
        })?;
        debug!(path = %path_file_out.display(), n_bytes = blob.bytes.len(), "file saved");
        Ok(())
    }
}

/// One file captured by [`MemorySaveSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSavedFile {
    /// File name offered by the download.
    pub file_name: String,
    /// Saved blob.
    pub blob: Arc<SpecBlob>,
}

/// Sink keeping saved files in memory.
#[derive(Debug, Default)]
pub struct MemorySaveSink {
    l_saved: Mutex<Vec<SpecSavedFile>>,
}

impl MemorySaveSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of saved files in save order.
    pub fn saved(&self) -> Vec<SpecSavedFile> {
        self.l_saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FileSaveSink for MemorySaveSink {
    fn save(
        &self,
        registry: &dyn BlobRegistry,
        url: &str,
        file_name: &str,
    ) -> Result<(), ExcelExportError> {
        let blob = fetch_blob(registry, url)?;
        self.l_saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SpecSavedFile {
                file_name: file_name.to_string(),
                blob,
            });
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IdSource

/// Source of random identifiers for generated file names.
pub trait IdSource: Send + Sync {
    /// Fresh identifier; its first `-` group becomes the file stem.
    fn generate_id(&self) -> String;
}

/// UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdSource;

impl IdSource for UuidIdSource {
    fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::C_MIME_XLSX;

    fn derive_blob(v_bytes: &[u8]) -> SpecBlob {
        SpecBlob {
            bytes: v_bytes.to_vec(),
            mime_type: C_MIME_XLSX.to_string(),
        }
    }

    #[test]
    fn test_object_url_guard_revokes_on_drop() {
        let registry = MemoryBlobRegistry::new();
        {
            let guard = ObjectUrlGuard::create(&registry, derive_blob(b"abc"));
            assert!(guard.url().starts_with(C_OBJECT_URL_SCHEME));
            assert_eq!(registry.len(), 1);
            assert_eq!(registry.fetch(guard.url()).unwrap().bytes, b"abc");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_directory_save_sink_writes_blob_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryBlobRegistry::new();
        let sink = DirectorySaveSink::new(dir.path());

        let guard = ObjectUrlGuard::create(&registry, derive_blob(b"xlsx-bytes"));
        sink.save(&registry, guard.url(), "report.xlsx").unwrap();

        assert_eq!(
            fs::read(dir.path().join("report.xlsx")).unwrap(),
            b"xlsx-bytes"
        );
    }

    #[test]
    fn test_directory_save_sink_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryBlobRegistry::new();
        let sink = DirectorySaveSink::new(dir.path().join("missing_dir"));

        let guard = ObjectUrlGuard::create(&registry, derive_blob(b"x"));
        let err = sink.save(&registry, guard.url(), "a.xlsx").unwrap_err();
        assert!(matches!(err, ExcelExportError::Save { ref file_name, .. } if file_name == "a.xlsx"));
    }

    #[test]
    fn test_sinks_reject_unknown_url() {
        let registry = MemoryBlobRegistry::new();
        let sink = MemorySaveSink::new();

        let err = sink.save(&registry, "blob:nope", "a.xlsx").unwrap_err();
        assert!(matches!(err, ExcelExportError::BlobNotFound(_)));
        assert!(sink.saved().is_empty());
    }

    #[test]
    fn test_uuid_id_source_yields_hex_groups() {
        let c_id = UuidIdSource.generate_id();
        let c_head = c_id.split('-').next().unwrap();
        assert_eq!(c_head.len(), 8);
        assert!(c_head.chars().all(|chr| chr.is_ascii_hexdigit()));
    }
}
