// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Error paths for POST /embed
//!
//! Client mistakes map to 4xx, model failures to 500, and every error uses
//! the same `{error_type, message, details?}` envelope.

use super::helpers::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use embedder::api::RequestLimits;
use embedder::embeddings::{EmbeddingModel, HashEmbeddingModel};
use serde_json::json;
use std::sync::Arc;

fn assert_envelope(body: &serde_json::Value, error_type: &str) {
    assert_eq!(body["error_type"], error_type, "body: {}", body);
    assert!(body["message"].is_string(), "body: {}", body);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let (status, body) = send(app(), post_json("/embed", r#"{"texts": ["unterminated"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, "invalid_request");
}

#[tokio::test]
async fn test_missing_texts_field_is_400() {
    let (status, body) = send(app(), post_json("/embed", r#"{"inputs": ["hello"]}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, "invalid_request");
}

#[tokio::test]
async fn test_non_string_texts_are_400() {
    for payload in [r#"{"texts": [1, 2]}"#, r#"{"texts": "hello"}"#, r#"{"texts": null}"#] {
        let (status, body) = send(app(), post_json("/embed", payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {}", payload);
        assert_envelope(&body, "invalid_request");
    }
}

#[tokio::test]
async fn test_missing_content_type_is_400() {
    let request = Request::builder()
        .method("POST")
        .uri("/embed")
        .body(Body::from(r#"{"texts": ["hello"]}"#))
        .unwrap();

    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, "invalid_request");
}

#[tokio::test]
async fn test_batch_over_limit_is_400_with_field() {
    let limits = RequestLimits {
        max_batch_size: Some(2),
        max_body_bytes: None,
    };
    let app = app_with(hash_model(), limits);

    let (status, body) = send(app, post_json("/embed", r#"{"texts": ["a", "b", "c"]}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body, "validation_error");
    assert_eq!(body["details"]["field"], "texts");
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let limits = RequestLimits {
        max_batch_size: None,
        max_body_bytes: Some(64),
    };
    let app = app_with(hash_model(), limits);
    let payload = json!({ "texts": ["x".repeat(256)] }).to_string();

    let (status, body) = send(app, post_json("/embed", payload)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_envelope(&body, "payload_too_large");
}

#[tokio::test]
async fn test_inference_failure_is_500() {
    let app = app_with(Arc::new(FailingModel), RequestLimits::default());

    let (status, body) = send(app, post_json("/embed", r#"{"texts": ["hello"]}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, "internal_error");
    assert!(!body.to_string().contains("ONNX session run failed"));
}

#[tokio::test]
async fn test_non_finite_output_is_500() {
    let app = app_with(Arc::new(NonFiniteModel), RequestLimits::default());

    let (status, body) = send(app, post_json("/embed", r#"{"texts": ["hello"]}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, "internal_error");
    assert!(body.get("embeddings").is_none());
}

#[tokio::test]
async fn test_count_mismatch_is_500_without_partial_results() {
    let model = TruncatingModel(HashEmbeddingModel::new(MODEL_NAME, DIMENSION).unwrap());
    let app = app_with(Arc::new(model), RequestLimits::default());

    let (status, body) = send(app, post_json("/embed", r#"{"texts": ["a", "b"]}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, "internal_error");
    assert!(body.get("embeddings").is_none());
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let (status, body) = send(app(), get("/embed")).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_envelope(&body, "method_not_allowed");
}

#[tokio::test]
async fn test_post_to_metadata_routes_is_405_envelope() {
    for uri in ["/info", "/health"] {
        let (status, body) = send(app(), post_json(uri, "{}")).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "uri {}", uri);
        assert_envelope(&body, "method_not_allowed");
    }
}

#[tokio::test]
async fn test_unknown_route_is_404_envelope() {
    let (status, body) = send(app(), get("/v1/embed")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&body, "not_found");
}

#[tokio::test]
async fn test_concurrent_failures_are_isolated() {
    let good = app();
    let bad = app_with(Arc::new(FailingModel), RequestLimits::default());

    let (ok, failed) = tokio::join!(
        send(good, post_json("/embed", r#"{"texts": ["hello"]}"#)),
        send(bad, post_json("/embed", r#"{"texts": ["hello"]}"#)),
    );

    assert_eq!(ok.0, StatusCode::OK);
    assert_eq!(failed.0, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_concurrent_requests_on_shared_model_are_isolated() {
    let app = app();
    let batches = [
        vec!["alpha", "beta"],
        vec!["gamma"],
        vec!["delta", "epsilon", "zeta"],
        vec!["alpha"],
    ];
    let request = |texts: &Vec<&str>| post_json("/embed", json!({ "texts": texts }).to_string());

    let (r0, r1, r2, r3) = tokio::join!(
        send(app.clone(), request(&batches[0])),
        send(app.clone(), request(&batches[1])),
        send(app.clone(), request(&batches[2])),
        send(app.clone(), request(&batches[3])),
    );

    let reference = HashEmbeddingModel::new(MODEL_NAME, DIMENSION).unwrap();
    for (texts, (status, body)) in batches.iter().zip([r0, r1, r2, r3]) {
        assert_eq!(status, StatusCode::OK);
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let expected = reference.embed_batch(&texts).await.unwrap();
        let actual = vectors(&body);
        assert_eq!(actual.len(), expected.len());
        for (got, want) in actual.iter().zip(&expected) {
            assert!(got.iter().zip(want).all(|(a, b)| (a - b).abs() < 1e-6));
        }
    }
}
