pub mod error;
pub mod orchestrator;


// Re-exports for convenience
pub use error::ProcessError;
pub use orchestrator::{extract_study_uid, Orchestrator, ProcessOutcome, Stage};
