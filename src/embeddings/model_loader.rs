// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding model loading
//!
//! Resolves the configured model identifier to files on disk, either a local
//! directory or a Hugging Face hub repo fetched into the hub cache, and builds
//! the ONNX model from them. Runs once at startup; any failure is fatal.

use super::{EmbeddingModel, OnnxEmbeddingModel, OnnxOptions};
use crate::config::EmbedderConfig;
use anyhow::{bail, Context, Result};
use hf_hub::api::tokio::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const TOKENIZER_FILE: &str = "tokenizer.json";
const POOLING_CONFIG_FILE: &str = "1_Pooling/config.json";
/// Candidate model locations, in lookup order
const ONNX_MODEL_FILES: &[&str] = &["onnx/model.onnx", "model.onnx"];

/// Files making up one exported sentence transformer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub pooling_config_path: Option<PathBuf>,
}

impl ModelFiles {
    /// Locates model files inside a local model directory
    ///
    /// `model.onnx` at the root is preferred over `onnx/model.onnx`.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let model_path = ONNX_MODEL_FILES
            .iter()
            .rev()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .with_context(|| format!("No model.onnx or onnx/model.onnx in {}", dir.display()))?;

        let tokenizer_path = dir.join(TOKENIZER_FILE);
        if !tokenizer_path.is_file() {
            bail!("No {} in {}", TOKENIZER_FILE, dir.display());
        }

        let pooling_config_path = Some(dir.join(POOLING_CONFIG_FILE)).filter(|p| p.is_file());

        Ok(Self {
            model_path,
            tokenizer_path,
            pooling_config_path,
        })
    }
}

/// Resolves `config.model_name` to local files, downloading from the hub if
/// it does not name an existing directory
pub async fn resolve_model_files(config: &EmbedderConfig) -> Result<ModelFiles> {
    let local_dir = Path::new(&config.model_name);
    if local_dir.is_dir() {
        info!("Using local model directory {}", local_dir.display());
        return ModelFiles::from_directory(local_dir);
    }

    fetch_from_hub(config).await
}

async fn fetch_from_hub(config: &EmbedderConfig) -> Result<ModelFiles> {
    let mut builder = ApiBuilder::new()
        .with_progress(false)
        .with_token(config.hf_token.clone());
    if let Some(cache_dir) = &config.cache_dir {
        builder = builder.with_cache_dir(cache_dir.clone());
    }
    let api = builder
        .build()
        .context("Failed to initialise Hugging Face hub client")?;

    let repo = api.repo(Repo::with_revision(
        config.model_name.clone(),
        RepoType::Model,
        config.model_revision.clone(),
    ));

    info!(
        "Fetching {} (revision {}) from Hugging Face hub",
        config.model_name, config.model_revision
    );

    let tokenizer_path = repo
        .get(TOKENIZER_FILE)
        .await
        .with_context(|| format!("Failed to fetch {} for {}", TOKENIZER_FILE, config.model_name))?;

    let (model_file, model_path) = fetch_onnx_model(&repo, &config.model_name).await?;

    // Large exports keep their weights in a sibling external-data file
    let external_data = format!("{}_data", model_file);
    match repo.get(&external_data).await {
        Ok(path) => debug!("Fetched external weights {}", path.display()),
        Err(e) => debug!("No {} in repo: {}", external_data, e),
    }

    let pooling_config_path = match repo.get(POOLING_CONFIG_FILE).await {
        Ok(path) => Some(path),
        Err(e) => {
            debug!("No pooling config, using mean pooling: {}", e);
            None
        }
    };

    Ok(ModelFiles {
        model_path,
        tokenizer_path,
        pooling_config_path,
    })
}

async fn fetch_onnx_model(repo: &ApiRepo, model_name: &str) -> Result<(&'static str, PathBuf)> {
    let mut last_error = None;

    for &file in ONNX_MODEL_FILES {
        match repo.get(file).await {
            Ok(path) => return Ok((file, path)),
            Err(e) => {
                debug!("{} not available for {}: {}", file, model_name, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e).with_context(|| {
            format!(
                "No ONNX export found for {} (looked for {})",
                model_name,
                ONNX_MODEL_FILES.join(", ")
            )
        }),
        None => bail!("No ONNX export found for {}", model_name),
    }
}

/// Resolves and loads the configured model
///
/// # Errors
/// Fails if the identifier cannot be resolved, files are missing, or the
/// ONNX session cannot be created. Callers treat this as fatal.
pub async fn load_model(config: &EmbedderConfig) -> Result<Arc<dyn EmbeddingModel>> {
    info!("Loading embedding model: {}", config.model_name);
    let start = Instant::now();

    let files = resolve_model_files(config).await?;
    debug!(?files, "Resolved model files");

    let model_name = config.model_name.clone();
    let options = OnnxOptions::from(config);
    let model = tokio::task::spawn_blocking(move || {
        OnnxEmbeddingModel::new(model_name, &files, &options)
    })
    .await
    .context("Model loading task failed to complete")??;

    info!(
        "Model loaded in {:.1} seconds ({} dimensions)",
        start.elapsed().as_secs_f64(),
        model.dimension()
    );

    Ok(Arc::new(model))
}
