// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sentence embedding models
//!
//! The service talks to a single [`EmbeddingModel`] created once at startup.
//! [`OnnxEmbeddingModel`] runs a sentence transformer through ONNX Runtime;
//! [`HashEmbeddingModel`] is a weight-free stand-in for tests and benchmarks.

pub mod hashing;
pub mod model_loader;
pub mod onnx_model;
pub mod pooling;

pub use hashing::HashEmbeddingModel;
pub use model_loader::{load_model, resolve_model_files, ModelFiles};
pub use onnx_model::{OnnxEmbeddingModel, OnnxOptions};
pub use pooling::Pooling;

use anyhow::Result;
use async_trait::async_trait;

/// A loaded, read-only text embedding model
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embeds `texts`, returning one unit-length vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("model returned no embedding"))
    }

    /// Identifier the model was loaded from
    fn model_name(&self) -> &str;

    /// Width of every vector this model produces
    fn dimension(&self) -> usize;
}

/// Scales `vector` to unit Euclidean length. A zero vector is left as is.
///
/// Expects finite input; NaN or infinite components yield a non-unit result.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
