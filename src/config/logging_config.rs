use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive used when `RUST_LOG` is not set.
    pub level: String,
    pub log_to_file: bool,
    pub log_file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file_path: "./tmp/dicom-interpreter.log".to_string(),
        }
    }
}
