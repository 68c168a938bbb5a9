// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Request body for POST /embed

use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// Request body for POST /embed
///
/// # Example
/// ```json
/// { "texts": ["Hello world", "Another text"] }
/// ```
///
/// Texts may be empty strings or repeat; order is preserved in the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

impl EmbedRequest {
    /// Checks the batch against the configured limit. `None` means unbounded.
    pub fn validate(&self, max_batch_size: Option<usize>) -> Result<(), ApiError> {
        if let Some(max) = max_batch_size {
            if self.texts.len() > max {
                return Err(ApiError::ValidationError {
                    field: "texts".to_string(),
                    message: format!(
                        "texts array cannot contain more than {} items (got {})",
                        max,
                        self.texts.len()
                    ),
                });
            }
        }

        Ok(())
    }
}
