use crate::storage::{StorageBackend, StorageError, StorageResult, DICOM_SUBDIR, IMAGE_SUBDIR};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Filesystem-based storage backend
///
/// Scratch files live under `<root>/dicom` and `<root>/images`; both are created
/// up front so the first request never races on directory creation.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root_path: PathBuf,
}

impl FilesystemStorage {
    pub fn new<P: AsRef<Path>>(root_path: P) -> StorageResult<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        for sub in [DICOM_SUBDIR, IMAGE_SUBDIR] {
            let dir = root_path.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| {
                StorageError::Config(format!(
                    "Failed to create storage directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        // Keep the path verbatim; canonicalizing resolves /var -> /private/var on macOS.
        Ok(Self { root_path })
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    fn base_path(&self) -> &Path {
        &self.root_path
    }
}
