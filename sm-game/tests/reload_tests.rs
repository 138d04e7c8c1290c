//! Game data loading through the HTTP API
//!
//! Uses a temporary images directory with a manifest and a script-wrapped
//! similarity file, the layout produced by the preprocessing tools.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use sm_common::config::{ImagesConfig, SimilarityConfig, TomlConfig};
use sm_game::{build_router, sources, AppState};
use std::path::Path;
use tower::util::ServiceExt;

fn write_fixture(dir: &Path) {
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        std::fs::write(dir.join(name), b"not really a jpeg").unwrap();
    }
    sources::write_manifest(dir).unwrap();
    std::fs::write(
        dir.join("similarity.js"),
        r#"window.SIMILARITY_DATA = [
            {"image1": "a.jpg", "image2": "b.jpg", "similarity": 0.8},
            {"image1": "b.jpg", "image2": "c.jpg", "similarity": "0.3"},
            {"image1": "a.jpg", "image2": "c.jpg", "similarity": "n/a"}
        ];"#,
    )
    .unwrap();
}

fn config_for(dir: &Path) -> TomlConfig {
    TomlConfig {
        images: ImagesConfig {
            dir: dir.to_path_buf(),
            ..Default::default()
        },
        similarity: SimilarityConfig {
            path: dir.join("similarity.js"),
        },
        ..Default::default()
    }
}

async fn request(state: &AppState, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_before_and_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let state = AppState::new(config_for(dir.path()));

    let (_, before) = request(&state, "GET", "/api/status").await;
    assert_eq!(before["catalog_ready"], false);
    assert_eq!(before["catalog_size"], 0);

    let (status, reloaded) = request(&state, "POST", "/api/reload").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reloaded["applied"], true);
    assert_eq!(reloaded["catalog_size"], 3);
    assert_eq!(reloaded["similarity_pairs"], 2);

    let (_, after) = request(&state, "GET", "/api/status").await;
    assert_eq!(after["catalog_ready"], true);
    assert_eq!(after["similarity_ready"], true);
    assert_eq!(after["similarity_error"], Value::Null);
}

#[tokio::test]
async fn test_missing_similarity_file_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    std::fs::remove_file(dir.path().join("similarity.js")).unwrap();
    let state = AppState::new(config_for(dir.path()));

    state.reload().await;

    let (_, status) = request(&state, "GET", "/api/status").await;
    assert_eq!(status["catalog_size"], 3);
    assert_eq!(status["similarity_pairs"], 0);
    assert!(status["similarity_error"].is_string());
}

#[tokio::test]
async fn test_batch_waits_for_background_load() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let state = AppState::new(config_for(dir.path()));

    let (_, created) = request(&state, "POST", "/api/sessions").await;
    let id = created["session_id"].as_str().unwrap().to_string();

    let loader = state.clone();
    let load = tokio::spawn(async move { loader.reload().await });

    let (status, view) = request(&state, "POST", &format!("/api/sessions/{}/next", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "batch_loaded");
    assert_eq!(view["tiles"].as_array().unwrap().len(), 3);

    load.await.unwrap();
}

#[tokio::test]
async fn test_images_served_from_images_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let state = AppState::new(config_for(dir.path()));

    let request = Request::builder()
        .uri("/images/a.jpg")
        .body(Body::empty())
        .unwrap();
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
