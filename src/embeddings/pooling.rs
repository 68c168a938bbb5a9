// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Token-to-sentence pooling
//!
//! Sentence-transformers repos describe their pooling layer in
//! `1_Pooling/config.json`. Models without that file get mean pooling.

use anyhow::{Context, Result};
use ndarray::ArrayView2;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    /// Average of non-padding token embeddings
    #[default]
    Mean,
    /// Embedding of the first token
    Cls,
    /// Element-wise maximum over non-padding tokens
    Max,
    /// Embedding of the last non-padding token
    LastToken,
}

#[derive(Debug, Default, Deserialize)]
struct PoolingConfig {
    #[serde(default)]
    pooling_mode_cls_token: bool,
    #[serde(default)]
    pooling_mode_mean_tokens: bool,
    #[serde(default)]
    pooling_mode_max_tokens: bool,
    #[serde(default)]
    pooling_mode_lasttoken: bool,
}

impl Pooling {
    /// Parses a sentence-transformers pooling config
    pub fn from_config_json(json: &str) -> Result<Self> {
        let config: PoolingConfig =
            serde_json::from_str(json).context("Invalid pooling config")?;

        // CLS wins over mean when a config enables several modes; the
        // concatenated multi-mode layouts are not supported.
        let pooling = if config.pooling_mode_cls_token {
            Pooling::Cls
        } else if config.pooling_mode_lasttoken {
            Pooling::LastToken
        } else if config.pooling_mode_max_tokens && !config.pooling_mode_mean_tokens {
            Pooling::Max
        } else {
            Pooling::Mean
        };

        Ok(pooling)
    }

    /// Reads the pooling config at `path`, or returns mean pooling for `None`
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Self::from_config_json(&json)
            }
            None => Ok(Pooling::default()),
        }
    }

    /// Pools `tokens` (`[seq_len, hidden]`) into one vector, ignoring
    /// positions where `attention_mask` is 0.
    pub fn apply(&self, tokens: ArrayView2<'_, f32>, attention_mask: &[i64]) -> Vec<f32> {
        let (seq_len, hidden_dim) = tokens.dim();
        let seq_len = seq_len.min(attention_mask.len());

        match self {
            Pooling::Cls => tokens.row(0).to_vec(),
            Pooling::LastToken => {
                let last = (0..seq_len)
                    .rev()
                    .find(|&i| attention_mask[i] != 0)
                    .unwrap_or(0);
                tokens.row(last).to_vec()
            }
            Pooling::Mean => {
                let mut pooled = vec![0.0f32; hidden_dim];
                let mut sum_mask = 0.0f32;

                for i in 0..seq_len {
                    let mask_value = attention_mask[i] as f32;
                    if mask_value == 0.0 {
                        continue;
                    }
                    sum_mask += mask_value;
                    for (j, slot) in pooled.iter_mut().enumerate() {
                        *slot += tokens[[i, j]] * mask_value;
                    }
                }

                for val in &mut pooled {
                    *val /= sum_mask.max(1e-9);
                }
                pooled
            }
            Pooling::Max => {
                let mut pooled = vec![f32::NEG_INFINITY; hidden_dim];
                let mut seen = false;

                for i in (0..seq_len).filter(|&i| attention_mask[i] != 0) {
                    seen = true;
                    for (j, slot) in pooled.iter_mut().enumerate() {
                        *slot = slot.max(tokens[[i, j]]);
                    }
                }

                if !seen {
                    pooled.fill(0.0);
                }
                pooled
            }
        }
    }
}
