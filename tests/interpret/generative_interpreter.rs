#[path = "../http/common.rs"]
mod common;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use common::*;
use dicom_interpreter::config::Config;
use dicom_interpreter::interpret::{
    GenerativeInterpreter, GenerativeOptions, InterpretError, Interpretation,
    InterpretationRequest, Interpreter,
};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tower::ServiceExt;

const API_KEY: &str = "test-key";

#[derive(Clone, Copy)]
enum Mode {
    Answer,
    NoCandidates,
    LongAnswer,
    Stall,
}

/// Larger than any sensible cap on model output.
const LONG_ANSWER_LEN: usize = 200 * 1024;

struct MockModel {
    mode: Mode,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockModel {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            requests: Mutex::new(Vec::new()),
        })
    }
}

async fn generate(
    State(model): State<Arc<MockModel>>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" }
            })),
        )
            .into_response();
    }
    model.requests.lock().unwrap().push((action, body));

    match model.mode {
        Mode::Answer => Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "No acute " }, { "text": "findings." }] },
                "finishReason": "STOP"
            }]
        }))
        .into_response(),
        Mode::NoCandidates => Json(json!({ "candidates": [] })).into_response(),
        Mode::LongAnswer => Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "é".repeat(LONG_ANSWER_LEN / 2) }] },
                "finishReason": "MAX_TOKENS"
            }]
        }))
        .into_response(),
        Mode::Stall => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "candidates": [] })).into_response()
        }
    }
}

async fn build_mock_model(model: Arc<MockModel>) -> String {
    let app = Router::new()
        .route("/v1beta/models/{action}", post(generate))
        .with_state(model);
    format!("{}/v1beta", serve(app).await)
}

fn options(endpoint: &str, key: &str) -> GenerativeOptions {
    GenerativeOptions {
        endpoint: endpoint.to_string(),
        model: "test-model".to_string(),
        api_key: Some(key.to_string()),
        ..Default::default()
    }
}

fn request() -> InterpretationRequest {
    InterpretationRequest {
        study_uid: STUDY.to_string(),
        series_uid: SERIES.to_string(),
        instance_uid: INSTANCE.to_string(),
        dicom_file: "unused.dcm".into(),
        raster: None,
    }
}

#[tokio::test]
async fn returns_model_text_verbatim() {
    let model = MockModel::new(Mode::Answer);
    let endpoint = build_mock_model(model.clone()).await;
    let interpreter = GenerativeInterpreter::new(&options(&endpoint, API_KEY)).unwrap();

    let result = interpreter.interpret(&request()).await.unwrap();

    assert_eq!(result, Interpretation::Text("No acute findings.".to_string()));
    let requests = model.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "test-model:generateContent");
    let prompt = requests[0].1["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap();
    assert!(prompt.contains(INSTANCE));
}

#[tokio::test]
async fn rejected_key_is_api_error() {
    let endpoint = build_mock_model(MockModel::new(Mode::Answer)).await;
    let interpreter = GenerativeInterpreter::new(&options(&endpoint, "wrong")).unwrap();

    let err = interpreter.interpret(&request()).await.unwrap_err();

    match err {
        InterpretError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn no_candidates_is_empty_response() {
    let endpoint = build_mock_model(MockModel::new(Mode::NoCandidates)).await;
    let interpreter = GenerativeInterpreter::new(&options(&endpoint, API_KEY)).unwrap();

    let err = interpreter.interpret(&request()).await.unwrap_err();
    assert!(matches!(err, InterpretError::EmptyResponse));
}

#[tokio::test]
async fn long_answers_are_returned_whole() {
    let endpoint = build_mock_model(MockModel::new(Mode::LongAnswer)).await;
    let interpreter = GenerativeInterpreter::new(&options(&endpoint, API_KEY)).unwrap();

    let result = interpreter.interpret(&request()).await.unwrap();

    match result {
        Interpretation::Text(text) => {
            assert_eq!(text.len(), LONG_ANSWER_LEN);
            assert_eq!(text, "é".repeat(LONG_ANSWER_LEN / 2));
        }
        other => panic!("unexpected interpretation: {:?}", other),
    }
}

#[tokio::test]
async fn stalled_model_hits_the_configured_timeout() {
    let endpoint = build_mock_model(MockModel::new(Mode::Stall)).await;
    let interpreter = GenerativeInterpreter::new(&GenerativeOptions {
        timeout_secs: 1,
        ..options(&endpoint, API_KEY)
    })
    .unwrap();

    let started = Instant::now();
    let err = interpreter.interpret(&request()).await.unwrap_err();

    assert!(matches!(err, InterpretError::Timeout), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(4));
}

fn generative_config(archive: &str, scratch: &std::path::Path, endpoint: &str, key: &str) -> Config {
    test_config(
        archive,
        scratch,
        &format!(
            r#"
            [interpreter]
            strategy = "generative"
            endpoint = "{}"
            model = "test-model"
            api_key = "{}"
            attach_image = true
            "#,
            endpoint, key
        ),
    )
}

fn post_process(archive: &str) -> Request<Body> {
    Request::builder()
        .uri("/process-dicom")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "dicom_url": format!("{}/studies/{}", archive, STUDY) }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn pipeline_attaches_rendered_png_and_discards_it() {
    let model = MockModel::new(Mode::Answer);
    let endpoint = build_mock_model(model.clone()).await;
    let archive = build_mock_archive(Arc::new(MockArchive::with_object(synthetic_dicom([
        1, 2, 3, 4,
    ]))))
    .await;
    let scratch = TempDir::new().unwrap();
    let app = build_app(&generative_config(&archive, scratch.path(), &endpoint, API_KEY));

    let response = app.oneshot(post_process(&archive)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["interpretation"], "No acute findings.");
    assert_eq!(body["instance_uid"], INSTANCE);
    assert!(body.get("image_url").is_none());

    let requests = model.requests.lock().unwrap();
    let inline = &requests[0].1["contents"][0]["parts"][1]["inline_data"];
    assert_eq!(inline["mime_type"], "image/png");
    let png = base64::engine::general_purpose::STANDARD
        .decode(inline["data"].as_str().unwrap())
        .unwrap();
    assert!(image::load_from_memory(&png).is_ok());

    assert_eq!(std::fs::read_dir(scratch.path().join("images")).unwrap().count(), 0);
    assert_eq!(std::fs::read_dir(scratch.path().join("dicom")).unwrap().count(), 0);
}

#[tokio::test]
async fn model_failure_is_json_500() {
    let endpoint = build_mock_model(MockModel::new(Mode::Answer)).await;
    let archive = build_mock_archive(Arc::new(MockArchive::with_object(synthetic_dicom([
        1, 2, 3, 4,
    ]))))
    .await;
    let scratch = TempDir::new().unwrap();
    let app = build_app(&generative_config(&archive, scratch.path(), &endpoint, "wrong"));

    let response = app.oneshot(post_process(&archive)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "interpretation service returned 403: API key not valid" })
    );
}

#[test]
#[serial]
fn api_key_is_read_from_configured_env_var() {
    let var = "DICOM_INTERPRETER_TEST_MODEL_KEY";
    std::env::set_var(var, "from-env");

    let mut config = Config::from_toml_str(&format!(
        r#"
        [interpreter]
        strategy = "generative"
        api_key_env = "{}"
        "#,
        var
    ))
    .unwrap();
    config.apply_env();
    std::env::remove_var(var);

    config.validate().expect("key resolved from env");
    match &config.interpreter {
        dicom_interpreter::interpret::InterpreterConfig::Generative(opts) => {
            assert_eq!(opts.api_key.as_deref(), Some("from-env"));
            // Debug output must not leak the key.
            assert!(!format!("{:?}", opts).contains("from-env"));
        }
        other => panic!("unexpected interpreter: {:?}", other),
    }
}
