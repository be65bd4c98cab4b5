use crate::interpret::Interpretation;
use crate::pipeline::{Orchestrator, ProcessError, ProcessOutcome};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::header::{CONTENT_TYPE, HOST};
use http::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Shared, read-only state behind every route.
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Base for `image_url`; the request Host header is used when unset.
    pub public_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct InterpretationResponse {
    study_uid: String,
    series_uid: String,
    instance_uid: String,
    interpretation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeferredResponse {
    message: String,
    image_url: String,
    prompt: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/process-dicom", post(process_dicom))
        .route("/image/{filename}", get(serve_image))
        .route("/health", get(health))
        .with_state(state)
}

/// `POST /process-dicom` with `{"dicom_url": "..."}`.
///
/// The body is parsed from raw bytes so a missing or wrong content type is
/// reported the same way as a missing field.
async fn process_dicom(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let dicom_url = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("dicom_url").and_then(Value::as_str).map(str::to_string));
    let Some(dicom_url) = dicom_url else {
        return ProcessError::InvalidInput("Missing dicom_url in request".to_string())
            .into_response();
    };

    match state.orchestrator.process(&dicom_url).await {
        Ok(outcome) => render_outcome(&state, &headers, outcome),
        Err(err) => err.into_response(),
    }
}

fn render_outcome(state: &AppState, headers: &HeaderMap, outcome: ProcessOutcome) -> Response {
    let image_url = outcome
        .image
        .as_deref()
        .map(|name| image_url(state.public_url.as_deref(), headers, name));

    match outcome.interpretation {
        Interpretation::Text(text) => Json(InterpretationResponse {
            study_uid: outcome.study_uid,
            series_uid: outcome.series_uid,
            instance_uid: outcome.instance_uid,
            interpretation: text,
            image_url,
        })
        .into_response(),
        Interpretation::Deferred { message, prompt } => match image_url {
            Some(image_url) => Json(DeferredResponse {
                message,
                image_url,
                prompt,
            })
            .into_response(),
            None => ProcessError::RenderFailure("no image was retained".to_string())
                .into_response(),
        },
    }
}

/// Absolute URL of a retained image.
fn image_url(public_url: Option<&str>, headers: &HeaderMap, name: &str) -> String {
    let base = match public_url {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("http://{}", host))
            .unwrap_or_default(),
    };
    format!("{}/image/{}", base, name)
}

/// `GET /image/{filename}`
async fn serve_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    match state.orchestrator.storage().read_image(&filename).await {
        Ok(Some(bytes)) => ([(CONTENT_TYPE, "image/png")], bytes).into_response(),
        Ok(None) => ProcessError::NotFound("Image not found".to_string()).into_response(),
        Err(e) => {
            tracing::error!("Failed to read image '{}': {}", filename, e);
            ProcessError::from(e).into_response()
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "interpreter": state.orchestrator.interpreter_name(),
    }))
}
