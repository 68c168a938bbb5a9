// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Runs an exported sentence transformer through ONNX Runtime.
//!
//! Features:
//! - ONNX model loading from disk
//! - Optional CUDA acceleration (with automatic CPU fallback)
//! - Tokenization with truncation and per-batch padding
//! - Output width discovered at load time
//! - Mean / CLS / max / last-token pooling over token embeddings
//! - L2 normalization of every returned vector

use super::{l2_normalize, EmbeddingModel, ModelFiles, Pooling};
use crate::config::{EmbedderConfig, DEFAULT_INTRA_THREADS, DEFAULT_MAX_SEQUENCE_LENGTH};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Value;
use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

/// Runtime knobs for building the ONNX session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnnxOptions {
    /// Truncation length used when the tokenizer carries none
    pub max_sequence_length: usize,
    pub intra_threads: usize,
    pub use_cuda: bool,
}

impl Default for OnnxOptions {
    fn default() -> Self {
        Self {
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            intra_threads: DEFAULT_INTRA_THREADS,
            use_cuda: false,
        }
    }
}

impl From<&EmbedderConfig> for OnnxOptions {
    fn from(config: &EmbedderConfig) -> Self {
        Self {
            max_sequence_length: config.max_sequence_length,
            intra_threads: config.intra_threads,
            use_cuda: config.use_cuda,
        }
    }
}

/// ONNX-based sentence embedding model
///
/// # Thread Safety
/// All fields are behind `Arc`, so clones are cheap and share one session.
/// Inference holds the session lock for the duration of a batch.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model_name: String,
    dimension: usize,
    pooling: Pooling,
    uses_token_type_ids: bool,
    pad_id: i64,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("pooling", &self.pooling)
            .field("uses_token_type_ids", &self.uses_token_type_ids)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Loads the model described by `files`. Blocks; call from a blocking context.
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - Pooling config is unreadable
    /// - ONNX Runtime initialization fails
    /// - The validation inference fails or yields an empty vector
    pub fn new(
        model_name: impl Into<String>,
        files: &ModelFiles,
        options: &OnnxOptions,
    ) -> Result<Self> {
        let model_name = model_name.into();

        if !files.model_path.exists() {
            bail!("ONNX model file not found: {}", files.model_path.display());
        }
        if !files.tokenizer_path.exists() {
            bail!("Tokenizer file not found: {}", files.tokenizer_path.display());
        }

        let pooling = Pooling::from_optional_file(files.pooling_config_path.as_deref())?;

        let session = build_session(&files.model_path, options)?;
        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");
        debug!(
            inputs = ?session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            "ONNX session inputs"
        );

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        if tokenizer.get_truncation().is_none() {
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: options.max_sequence_length,
                    ..Default::default()
                }))
                .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        }
        let pad_id = tokenizer
            .get_padding()
            .map(|padding| padding.pad_id as i64)
            .unwrap_or(0);

        let mut model = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension: 0,
            pooling,
            uses_token_type_ids,
            pad_id,
        };

        // Probe once to learn the output width
        let probe = model
            .embed_blocking(&["validation test".to_string()])
            .context("Validation inference failed")?;
        model.dimension = probe
            .first()
            .map(Vec::len)
            .filter(|&dimension| dimension > 0)
            .context("Model produced an empty embedding during validation")?;

        info!(
            "ONNX embedding model {} ready ({} dimensions, {:?} pooling)",
            model.model_name, model.dimension, model.pooling
        );

        Ok(model)
    }

    /// Tokenizes, runs one batched inference, pools and normalizes
    pub fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings: Vec<Encoding> = texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let embeddings = self.run_batch(&encodings)?;

        if self.dimension > 0 {
            for (i, emb) in embeddings.iter().enumerate() {
                if emb.len() != self.dimension {
                    bail!(
                        "Unexpected embedding dimension at index {}: {} (expected {})",
                        i,
                        emb.len(),
                        self.dimension
                    );
                }
            }
        }

        Ok(embeddings)
    }

    fn run_batch(&self, encodings: &[Encoding]) -> Result<Vec<Vec<f32>>> {
        let batch_size = encodings.len();
        // A zero-width tensor is rejected by most graphs
        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_ids = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask = Vec::with_capacity(batch_size * max_len);

        for encoding in encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let padding_needed = max_len - ids.len();

            input_ids.extend(ids.iter().map(|&id| id as i64));
            input_ids.extend(std::iter::repeat(self.pad_id).take(padding_needed));
            attention_mask.extend(mask.iter().map(|&m| m as i64));
            attention_mask.extend(std::iter::repeat(0i64).take(padding_needed));
        }

        let input_ids_array = Array2::from_shape_vec((batch_size, max_len), input_ids)
            .context("Failed to create batch input_ids array")?;
        let attention_mask_array =
            Array2::from_shape_vec((batch_size, max_len), attention_mask.clone())
                .context("Failed to create batch attention_mask array")?;

        let mut inputs = ort::inputs![
            "input_ids" => Value::from_array(input_ids_array)?,
            "attention_mask" => Value::from_array(attention_mask_array)?
        ];
        if self.uses_token_type_ids {
            let token_type_ids = Array2::<i64>::zeros((batch_size, max_len));
            inputs.push((
                Cow::Borrowed("token_type_ids"),
                SessionInputValue::from(Value::from_array(token_type_ids)?),
            ));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
        let outputs = session.run(inputs)?;

        // Output names differ between exports; the first output is the
        // embedding tensor in every sentence-transformers export
        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let mut embeddings: Vec<Vec<f32>> = match output.ndim() {
            // [batch, seq_len, hidden]: token embeddings
            3 => (0..batch_size)
                .map(|batch_idx| -> Result<Vec<f32>> {
                    let item = output
                        .index_axis(Axis(0), batch_idx)
                        .into_dimensionality::<Ix2>()
                        .context("Unexpected token embedding shape")?;
                    let item_mask = &attention_mask[batch_idx * max_len..(batch_idx + 1) * max_len];
                    Ok(self.pooling.apply(item, item_mask))
                })
                .collect::<Result<Vec<_>>>()?,
            // [batch, hidden]: already pooled
            2 => output
                .axis_iter(Axis(0))
                .map(|row| row.iter().copied().collect())
                .collect(),
            _ => bail!(
                "Model outputs unexpected dimensions: {:?} (expected [batch, seq_len, hidden] or [batch, hidden])",
                output.shape()
            ),
        };

        if embeddings.len() != batch_size {
            bail!(
                "Model returned {} embeddings for {} inputs",
                embeddings.len(),
                batch_size
            );
        }

        for (i, embedding) in embeddings.iter_mut().enumerate() {
            if embedding.iter().any(|value| !value.is_finite()) {
                bail!("Model produced a non-finite value in embedding {}", i);
            }
            l2_normalize(embedding);
        }

        Ok(embeddings)
    }

    /// Number of non-padding tokens (including special tokens) in `text`
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        Ok(encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as usize)
            .sum())
    }

    pub fn pooling(&self) -> Pooling {
        self.pooling
    }
}

#[async_trait]
impl EmbeddingModel for OnnxEmbeddingModel {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let model = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed_blocking(&texts))
            .await
            .context("Embedding task failed to complete")?
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn build_session(model_path: &Path, options: &OnnxOptions) -> Result<Session> {
    #[cfg(feature = "cuda")]
    if options.use_cuda {
        use ort::execution_providers::CUDAExecutionProvider;

        info!("Attempting CUDA execution provider...");
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(options.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        match cuda_result {
            Ok(session) => {
                info!("CUDA execution provider initialized");
                return Ok(session);
            }
            Err(e) => {
                warn!("CUDA execution provider failed: {}", e);
                warn!("Falling back to CPU execution provider");
            }
        }
    }

    #[cfg(not(feature = "cuda"))]
    if options.use_cuda {
        warn!("CUDA requested but this build lacks the `cuda` feature; using CPU");
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(options.intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

    Ok(session)
}
