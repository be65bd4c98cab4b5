use crate::config::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable holding the generative API key unless overridden.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum InterpreterConfig {
    Static(StaticOptions),
    Generative(GenerativeOptions),
    Deferred(DeferredOptions),
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig::Static(StaticOptions::default())
    }
}

impl InterpreterConfig {
    pub fn resolve_api_key(&mut self) {
        if let InterpreterConfig::Generative(opts) = self {
            if opts.api_key.is_none() {
                opts.api_key = std::env::var(&opts.api_key_env)
                    .ok()
                    .filter(|s| !s.trim().is_empty());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            InterpreterConfig::Static(opts) => non_empty("template", &opts.template),
            InterpreterConfig::Generative(opts) => {
                non_empty("prompt", &opts.prompt)?;
                non_empty("model", &opts.model)?;
                url::Url::parse(&opts.endpoint).map_err(|e| {
                    ConfigError::InvalidInterpreter(format!("endpoint '{}': {}", opts.endpoint, e))
                })?;
                if opts.timeout_secs == 0 {
                    return Err(ConfigError::InvalidInterpreter(
                        "timeout_secs must be greater than zero".to_string(),
                    ));
                }
                if opts.api_key.is_none() {
                    return Err(ConfigError::MissingApiKey(opts.api_key_env.clone()));
                }
                Ok(())
            }
            InterpreterConfig::Deferred(opts) => {
                non_empty("message", &opts.message)?;
                non_empty("prompt", &opts.prompt)
            }
        }
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidInterpreter(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StaticOptions {
    pub template: String,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            template: "Interpretation of DICOM instance {instance_uid}".to_string(),
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct GenerativeOptions {
    /// Generative Language API root.
    pub endpoint: String,
    pub model: String,
    /// Explicit key; normally left unset and read from `api_key_env`.
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub prompt: String,
    /// Send the rendered PNG inline alongside the prompt.
    pub attach_image: bool,
    pub timeout_secs: u64,
}

impl Default for GenerativeOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            prompt: "Provide a concise radiological interpretation of the DICOM instance \
                     with SOP Instance UID {instance_uid} (series {series_uid}, study {study_uid})."
                .to_string(),
            attach_image: false,
            timeout_secs: 30,
        }
    }
}

impl GenerativeOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Hand-written so the key never lands in logs.
impl std::fmt::Debug for GenerativeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeOptions")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("attach_image", &self.attach_image)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeferredOptions {
    pub message: String,
    pub prompt: String,
}

impl Default for DeferredOptions {
    fn default() -> Self {
        Self {
            message: "DICOM image converted successfully".to_string(),
            prompt: "You are a radiologist. Describe the findings visible in this medical image \
                     and give a short impression."
                .to_string(),
        }
    }
}
