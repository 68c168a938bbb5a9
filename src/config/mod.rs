// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Environment-driven service configuration
//!
//! Every setting comes from the process environment (optionally seeded from
//! a `.env` file by `main`). There are no command-line flags.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Model loaded when `EMBEDDING_MODEL_NAME` is unset
///
/// A plain sentence-transformers export; task-conditioned models such as
/// `jinaai/jina-embeddings-v3` need an extra `task_id` graph input we never feed.
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Hub revision used when `EMBEDDING_MODEL_REVISION` is unset
pub const DEFAULT_MODEL_REVISION: &str = "main";

/// Port the service listens on when `EMBEDDER_PORT` is unset
pub const DEFAULT_PORT: u16 = 3002;

pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;
pub const DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderConfig {
    /// Hugging Face repo id or local model directory
    pub model_name: String,
    pub model_revision: String,
    /// Hub download cache; `None` uses the hub's own default location
    pub cache_dir: Option<PathBuf>,
    pub hf_token: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    /// Truncation applied when the tokenizer ships without one
    pub max_sequence_length: usize,
    pub intra_threads: usize,
    pub use_cuda: bool,
    /// Upper bound on texts per request; `None` means unbounded
    pub max_batch_size: Option<usize>,
    /// Request body limit in bytes; `None` means unbounded
    pub max_body_bytes: Option<usize>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_revision: DEFAULT_MODEL_REVISION.to_string(),
            cache_dir: None,
            hf_token: None,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            intra_threads: DEFAULT_INTRA_THREADS,
            use_cuda: false,
            max_batch_size: None,
            max_body_bytes: None,
        }
    }
}

impl EmbedderConfig {
    /// Reads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, treating empty values as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            model_name: get("EMBEDDING_MODEL_NAME").unwrap_or(defaults.model_name),
            model_revision: get("EMBEDDING_MODEL_REVISION").unwrap_or(defaults.model_revision),
            cache_dir: get("EMBEDDER_CACHE_DIR").map(PathBuf::from),
            hf_token: get("HF_TOKEN"),
            host: parse_var("EMBEDDER_HOST", get("EMBEDDER_HOST"))?.unwrap_or(defaults.host),
            port: parse_var("EMBEDDER_PORT", get("EMBEDDER_PORT"))?.unwrap_or(defaults.port),
            max_sequence_length: positive_var(
                "EMBEDDER_MAX_SEQUENCE_LENGTH",
                get("EMBEDDER_MAX_SEQUENCE_LENGTH"),
            )?
            .unwrap_or(defaults.max_sequence_length),
            intra_threads: positive_var("EMBEDDER_INTRA_THREADS", get("EMBEDDER_INTRA_THREADS"))?
                .unwrap_or(defaults.intra_threads),
            use_cuda: bool_var("EMBEDDER_CUDA", get("EMBEDDER_CUDA"))?.unwrap_or(false),
            max_batch_size: positive_var(
                "EMBEDDER_MAX_BATCH_SIZE",
                get("EMBEDDER_MAX_BATCH_SIZE"),
            )?,
            max_body_bytes: positive_var(
                "EMBEDDER_MAX_BODY_BYTES",
                get("EMBEDDER_MAX_BODY_BYTES"),
            )?,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T>(var: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            var,
            reason: e.to_string(),
            value,
        })
    })
    .transpose()
}

fn positive_var(var: &'static str, raw: Option<String>) -> Result<Option<usize>, ConfigError> {
    match parse_var::<usize>(var, raw)? {
        Some(0) => Err(ConfigError::InvalidValue {
            var,
            value: "0".to_string(),
            reason: "must be greater than 0".to_string(),
        }),
        other => Ok(other),
    }
}

fn bool_var(var: &'static str, raw: Option<String>) -> Result<Option<bool>, ConfigError> {
    raw.map(|value| match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value,
            reason: "expected true or false".to_string(),
        }),
    })
    .transpose()
}
