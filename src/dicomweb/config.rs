use crate::config::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// How one entry is picked from a QIDO result list.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Take whatever the archive returns first.
    #[default]
    First,
    /// Take the lowest UID in byte order, independent of archive ordering.
    Lexicographic,
}

impl SelectionPolicy {
    pub fn select<'a>(&self, uids: &'a [String]) -> Option<&'a String> {
        match self {
            SelectionPolicy::First => uids.first(),
            SelectionPolicy::Lexicographic => uids.iter().min(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArchiveConfig {
    /// DICOMweb root, e.g. `http://host:8080/dcm4chee-arc/aets/DCM4CHEE/rs`.
    pub base_url: String,
    pub timeout_secs: u64,
    pub selection: SelectionPolicy,
    pub bearer_token: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/dcm4chee-arc/aets/DCM4CHEE/rs".to_string(),
            timeout_secs: 30,
            selection: SelectionPolicy::First,
            bearer_token: None,
        }
    }
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidArchive(
                "base_url must not be empty".to_string(),
            ));
        }
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidArchive(format!("base_url '{}': {}", self.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidArchive(format!(
                "base_url must be http(s), got '{}'",
                parsed.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidArchive(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
