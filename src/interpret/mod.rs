//! Interpretation strategies.
//!
//! The orchestrator only sees [`Interpreter`]; which implementation runs is
//! decided once from [`InterpreterConfig`] at start-up.

mod config;
mod deferred;
mod generative;
mod static_text;

pub use config::{
    DeferredOptions, GenerativeOptions, InterpreterConfig, StaticOptions, DEFAULT_API_KEY_ENV,
};
pub use deferred::DeferredInterpreter;
pub use generative::GenerativeInterpreter;
pub use static_text::StaticInterpreter;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("interpretation service not configured: {0}")]
    NotConfigured(String),

    #[error("interpretation request failed: {0}")]
    Request(String),

    #[error("interpretation request timed out")]
    Timeout,

    #[error("interpretation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("interpretation service returned no text")]
    EmptyResponse,

    #[error("failed to read rendered image: {0}")]
    Image(#[from] std::io::Error),
}

/// Identifiers resolved by the pipeline plus the optional raster.
#[derive(Debug, Clone)]
pub struct InterpretationRequest {
    pub study_uid: String,
    pub series_uid: String,
    pub instance_uid: String,
    /// Downloaded DICOM object; only valid for the duration of the call.
    pub dicom_file: PathBuf,
    /// Rendered PNG, present when the interpreter asked for one.
    pub raster: Option<PathBuf>,
}

impl InterpretationRequest {
    /// Substitute `{study_uid}`, `{series_uid}` and `{instance_uid}` in a template.
    pub fn fill(&self, template: &str) -> String {
        template
            .replace("{study_uid}", &self.study_uid)
            .replace("{series_uid}", &self.series_uid)
            .replace("{instance_uid}", &self.instance_uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// Finished interpretation text.
    Text(String),
    /// Interpretation left to the caller, who gets the raster and a prompt.
    Deferred { message: String, prompt: String },
}

#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Whether the pipeline must rasterize the object before calling [`Interpreter::interpret`].
    fn needs_raster(&self) -> bool {
        false
    }

    /// Whether the raster is handed back to the caller and must outlive the request.
    fn serves_raster(&self) -> bool {
        false
    }

    async fn interpret(
        &self,
        request: &InterpretationRequest,
    ) -> Result<Interpretation, InterpretError>;

    /// Strategy name for logging.
    fn name(&self) -> &'static str;
}

/// Build the configured strategy.
pub fn build_interpreter(config: &InterpreterConfig) -> Result<Arc<dyn Interpreter>, InterpretError> {
    Ok(match config {
        InterpreterConfig::Static(opts) => Arc::new(StaticInterpreter::new(opts.template.clone())),
        InterpreterConfig::Generative(opts) => Arc::new(GenerativeInterpreter::new(opts)?),
        InterpreterConfig::Deferred(opts) => Arc::new(DeferredInterpreter::new(
            opts.message.clone(),
            opts.prompt.clone(),
        )),
    })
}
