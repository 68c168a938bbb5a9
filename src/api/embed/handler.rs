// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embed HTTP handler

use crate::api::embed::{EmbedRequest, EmbedResponse};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use std::time::Instant;
use tracing::{error, info, warn};

/// POST /embed handler
///
/// # Request Body
/// ```json
/// { "texts": ["text1", "text2"] }
/// ```
///
/// # Response Body
/// ```json
/// { "embeddings": [[0.1, 0.2, ...], [0.3, 0.4, ...]] }
/// ```
///
/// Malformed bodies and batches over the configured limit are client errors
/// (400, or 413 for oversized bodies); model failures are 500.
pub async fn embed_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected embed request: {}", rejection.body_text());
        ApiError::from(rejection)
    })?;

    request.validate(state.limits.max_batch_size)?;

    if request.texts.is_empty() {
        return Ok(Json(EmbedResponse::default()));
    }

    let started = Instant::now();
    let embeddings = state
        .model
        .embed_batch(&request.texts)
        .await
        .map_err(|e| {
            error!("Embedding generation failed: {:#}", e);
            ApiError::InternalError("Embedding generation failed".to_string())
        })?;

    if embeddings.len() != request.texts.len() {
        error!(
            "Model returned {} embeddings for {} texts",
            embeddings.len(),
            request.texts.len()
        );
        return Err(ApiError::InternalError(
            "Model returned a mismatched number of embeddings".to_string(),
        ));
    }

    if let Some(index) = embeddings
        .iter()
        .position(|embedding| embedding.iter().any(|value| !value.is_finite()))
    {
        error!("Model returned a non-finite embedding at index {}", index);
        return Err(ApiError::InternalError(
            "Model returned a non-finite embedding".to_string(),
        ));
    }

    info!(
        texts = request.texts.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Embedded batch"
    );

    Ok(Json(EmbedResponse::from(embeddings)))
}
