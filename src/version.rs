// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the embedding service

/// Semantic version number
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name as reported in startup logs
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// HTTP endpoints served by this version
pub const ENDPOINTS: &[&str] = &["POST /embed", "GET /info", "GET /health"];
