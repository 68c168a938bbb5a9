// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod embeddings;
pub mod version;

pub use api::{create_app, start_server, AppState, RequestLimits};
pub use config::{ConfigError, EmbedderConfig};
pub use embeddings::{load_model, EmbeddingModel, HashEmbeddingModel, OnnxEmbeddingModel};
