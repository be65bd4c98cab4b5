use crate::config::ConfigError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

pub mod filesystem;

pub use filesystem::FilesystemStorage;

/// Subdirectory holding downloaded DICOM objects.
pub const DICOM_SUBDIR: &str = "dicom";
/// Subdirectory holding rendered rasters served by `GET /image/{filename}`.
pub const IMAGE_SUBDIR: &str = "images";

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Path(String),
    Config(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "IO error: {}", e),
            StorageError::Path(e) => write!(f, "Path error: {}", e),
            StorageError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// What a scratch file holds; decides its directory and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchKind {
    Dicom,
    Image,
}

impl ScratchKind {
    fn subdir(self) -> &'static str {
        match self {
            ScratchKind::Dicom => DICOM_SUBDIR,
            ScratchKind::Image => IMAGE_SUBDIR,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ScratchKind::Dicom => "dcm",
            ScratchKind::Image => "png",
        }
    }
}

/// A request-scoped file under the storage root.
///
/// The file is removed when the guard is dropped unless [`ScratchFile::keep`] is called,
/// so every exit path of a request (including early `?` returns) cleans up after itself.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bare file name, as exposed through the image endpoint.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Disarm the guard and leave the file on disk.
    pub fn keep(self) -> StorageResult<PathBuf> {
        self.path.keep().map_err(|e| StorageError::Io(e.error))
    }
}

/// Storage backend trait for the scratch area used by the pipeline
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Get the base path for this storage backend
    fn base_path(&self) -> &Path;

    /// Create a subpath relative to the storage root
    fn subpath_str(&self, path: &str) -> PathBuf {
        self.base_path().join(path)
    }

    /// Ensure a directory exists under the storage root, creating it if necessary
    fn ensure_dir_str(&self, path: &str) -> StorageResult<PathBuf> {
        let full_path = self.subpath_str(path);
        std::fs::create_dir_all(&full_path)?;
        Ok(full_path)
    }

    /// Reserve a fresh, collision-free scratch path without writing to it.
    ///
    /// Names come from a v4 UUID, never from request input.
    fn reserve(&self, kind: ScratchKind) -> StorageResult<ScratchFile> {
        let dir = self.ensure_dir_str(kind.subdir())?;
        let name = format!("{}.{}", uuid::Uuid::new_v4(), kind.extension());
        Ok(ScratchFile {
            path: TempPath::from_path(dir.join(name)),
        })
    }

    /// Write bytes verbatim to a new scratch file.
    async fn write_scratch(&self, kind: ScratchKind, contents: &[u8]) -> StorageResult<ScratchFile> {
        let file = self.reserve(kind)?;
        tokio::fs::write(file.path(), contents).await?;
        Ok(file)
    }

    /// Map an image name from the outside world to a file in the image directory.
    ///
    /// Only plain file names are accepted; anything with separators or parent
    /// components resolves to `None`. The filesystem is not touched.
    fn resolve_image(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.starts_with('.')
        {
            return None;
        }
        Some(self.subpath_str(IMAGE_SUBDIR).join(name))
    }

    /// Read a previously retained image, `Ok(None)` when it does not exist.
    async fn read_image(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let Some(path) = self.resolve_image(name) else {
            return Ok(None);
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Configuration for storage backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Keep rendered rasters even when the interpreter does not serve them.
    pub retain_images: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_path(),
            retain_images: false,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend != "filesystem" {
            return Err(ConfigError::InvalidStorage(format!(
                "unknown storage backend: {}",
                self.backend
            )));
        }
        if self.path.trim().is_empty() {
            return Err(ConfigError::InvalidStorage(
                "path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_backend() -> String {
    "filesystem".to_string()
}

fn default_path() -> String {
    "./tmp".to_string()
}

/// Create a storage backend from configuration
pub fn create_storage_backend(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    match config.backend.as_str() {
        "filesystem" => {
            let storage = FilesystemStorage::new(&config.path)?;
            Ok(Arc::new(storage))
        }
        _ => Err(StorageError::Config(format!(
            "Unknown storage backend: {}",
            config.backend
        ))),
    }
}
