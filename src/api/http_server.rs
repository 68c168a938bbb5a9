// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, warn, Level};

use super::embed::embed_handler;
use super::handlers::{
    health_handler, info_handler, method_not_allowed_handler, not_found_handler,
};
use crate::config::EmbedderConfig;
use crate::embeddings::EmbeddingModel;

/// Per-request limits; `None` leaves a dimension unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_batch_size: Option<usize>,
    pub max_body_bytes: Option<usize>,
}

impl From<&EmbedderConfig> for RequestLimits {
    fn from(config: &EmbedderConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Shared handler state: the one model loaded at startup
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn EmbeddingModel>,
    pub limits: RequestLimits,
}

impl AppState {
    pub fn new(model: Arc<dyn EmbeddingModel>, limits: RequestLimits) -> Self {
        Self { model, limits }
    }
}

/// Builds the router for `state`
pub fn create_app(state: AppState) -> Router {
    let body_limit = match state.limits.max_body_bytes {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route(
            "/embed",
            post(embed_handler).fallback(method_not_allowed_handler),
        )
        .route("/info", get(info_handler).fallback(method_not_allowed_handler))
        .route(
            "/health",
            get(health_handler).fallback(method_not_allowed_handler),
        )
        .fallback(not_found_handler)
        .layer(body_limit)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves `model` on the configured address until Ctrl-C or SIGTERM
pub async fn start_server(config: &EmbedderConfig, model: Arc<dyn EmbeddingModel>) -> Result<()> {
    let app = create_app(AppState::new(model, RequestLimits::from(config)));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Embedding server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Embedding server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
