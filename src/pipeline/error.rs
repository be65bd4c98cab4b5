use crate::dicomweb::ArchiveError;
use crate::interpret::InterpretError;
use crate::render::RenderError;
use crate::storage::StorageError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

/// Everything a request can fail with, as reported to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Missing or malformed request field.
    #[error("{0}")]
    InvalidInput(String),

    /// The archive answered with something other than 200.
    #[error("{message}")]
    UpstreamFetchFailed { status: u16, message: String },

    /// The archive answered 200 with an empty list.
    #[error("{0}")]
    EmptyResult(String),

    /// The archive could not be reached or timed out.
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// The archive answered 200 but the body was not usable DICOM JSON.
    #[error("{0}")]
    MalformedResponse(String),

    #[error("{0}")]
    RenderFailure(String),

    #[error("{0}")]
    InterpretationFailure(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Storage(String),
}

impl ProcessError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProcessError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProcessError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ArchiveError> for ProcessError {
    fn from(err: ArchiveError) -> Self {
        let message = err.to_string();
        match err {
            ArchiveError::Status { status, .. } => {
                ProcessError::UpstreamFetchFailed { status, message }
            }
            ArchiveError::Empty(_) => ProcessError::EmptyResult(message),
            ArchiveError::Transport { .. } | ArchiveError::Client(_) => {
                ProcessError::UpstreamUnavailable(message)
            }
            ArchiveError::Malformed { .. } => ProcessError::MalformedResponse(message),
        }
    }
}

impl From<RenderError> for ProcessError {
    fn from(err: RenderError) -> Self {
        ProcessError::RenderFailure(err.to_string())
    }
}

impl From<InterpretError> for ProcessError {
    fn from(err: InterpretError) -> Self {
        ProcessError::InterpretationFailure(err.to_string())
    }
}

impl From<StorageError> for ProcessError {
    fn from(err: StorageError) -> Self {
        ProcessError::Storage(err.to_string())
    }
}

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}
