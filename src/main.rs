// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use embedder::{api::start_server, config::EmbedderConfig, embeddings::load_model, version};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting {} v{}", version::NAME, version::VERSION);

    let config = EmbedderConfig::from_env().context("Invalid configuration")?;
    info!("Using model: {}", config.model_name);

    // Nothing is served until the model is ready; a load failure ends the process
    let model = match load_model(&config).await {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to load embedding model {}: {:#}", config.model_name, e);
            return Err(e);
        }
    };

    info!("Starting server...");
    for endpoint in version::ENDPOINTS {
        info!("  {}", endpoint);
    }

    start_server(&config, model).await
}
