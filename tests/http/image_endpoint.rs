mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn unknown_image_is_404_with_error_body() {
    let archive = build_mock_archive(Arc::new(MockArchive::with_object(Vec::new()))).await;
    let scratch = TempDir::new().unwrap();
    let app = build_app(&test_config(&archive, scratch.path(), ""));

    for uri in [
        "/image/does-not-exist.png",
        "/image/..%2F..%2Fetc%2Fpasswd",
        "/image/.hidden.png",
    ] {
        let response = get(app.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Image not found" })
        );
    }
}

#[tokio::test]
async fn files_outside_image_dir_are_not_served() {
    let archive = build_mock_archive(Arc::new(MockArchive::with_object(Vec::new()))).await;
    let scratch = TempDir::new().unwrap();
    let app = build_app(&test_config(&archive, scratch.path(), ""));
    std::fs::write(scratch.path().join("dicom").join("leak.png"), b"x").unwrap();

    let response = get(app, "/image/leak.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn existing_image_is_served_as_png() {
    let archive = build_mock_archive(Arc::new(MockArchive::with_object(Vec::new()))).await;
    let scratch = TempDir::new().unwrap();
    let app = build_app(&test_config(&archive, scratch.path(), ""));
    let png = b"\x89PNG\r\n\x1a\nfake".to_vec();
    std::fs::write(scratch.path().join("images").join("known.png"), &png).unwrap();

    let response = get(app, "/image/known.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.to_vec(), png);
}
