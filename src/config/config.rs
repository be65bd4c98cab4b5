use crate::config::{LoggingConfig, ServerConfig};
use crate::dicomweb::ArchiveConfig;
use crate::interpret::InterpreterConfig;
use crate::storage::StorageConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Overrides `archive.base_url` when set.
pub const ARCHIVE_URL_ENV: &str = "DICOM_ARCHIVE_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid server config: {0}")]
    InvalidServer(String),

    #[error("invalid archive config: {0}")]
    InvalidArchive(String),

    #[error("invalid storage config: {0}")]
    InvalidStorage(String),

    #[error("invalid interpreter config: {0}")]
    InvalidInterpreter(String),

    #[error("generative interpreter requires an API key (set {0})")]
    MissingApiKey(String),
}

/// Top-level service configuration, built once at start-up and shared behind an `Arc`.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub archive: ArchiveConfig,
    pub storage: StorageConfig,
    pub interpreter: InterpreterConfig,
}

impl Config {
    /// Read, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Pull process-wide values (archive URL override, model API key) from the environment.
    pub fn apply_env(&mut self) {
        if let Some(url) = std::env::var(ARCHIVE_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            self.archive.base_url = url;
        }
        self.interpreter.resolve_api_key();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.archive.validate()?;
        self.storage.validate()?;
        self.interpreter.validate()?;
        Ok(())
    }
}
