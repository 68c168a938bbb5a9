// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX model tests against real weights
//!
//! Point `EMBEDDER_TEST_MODEL_DIR` at an exported sentence transformer
//! (a directory holding `model.onnx` or `onnx/model.onnx` plus
//! `tokenizer.json`) and run with `--ignored`.

use embedder::config::EmbedderConfig;
use embedder::embeddings::{
    load_model, resolve_model_files, EmbeddingModel, OnnxEmbeddingModel, OnnxOptions,
};

fn model_dir() -> String {
    std::env::var("EMBEDDER_TEST_MODEL_DIR")
        .expect("EMBEDDER_TEST_MODEL_DIR must point at an ONNX model directory")
}

fn config() -> EmbedderConfig {
    EmbedderConfig {
        model_name: model_dir(),
        ..EmbedderConfig::default()
    }
}

async fn onnx_model() -> OnnxEmbeddingModel {
    let config = config();
    let files = resolve_model_files(&config).await.expect("model files");
    OnnxEmbeddingModel::new(config.model_name.clone(), &files, &OnnxOptions::from(&config))
        .expect("Failed to load model")
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    // Inputs are unit length
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod onnx_model_tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_model_loads_and_reports_identifier() {
        let model = load_model(&config()).await.expect("Failed to load model");

        assert_eq!(model.model_name(), model_dir());
        assert!(model.dimension() > 0);
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_batch_is_ordered_and_normalized() {
        let model = onnx_model().await;
        let texts = vec![
            "hello".to_string(),
            "the quick brown fox jumps over the lazy dog".to_string(),
            String::new(),
        ];

        let embeddings = model.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), model.dimension());
            let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-3, "norm {}", norm);
        }

        let single = model.embed("hello").await.unwrap();
        assert!(cosine(&single, &embeddings[0]) > 0.999);
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_padding_does_not_change_result() {
        let model = onnx_model().await;

        let alone = model.embed("short").await.unwrap();
        let batched = model
            .embed_batch(&[
                "short".to_string(),
                "a considerably longer sentence that forces padding of the first".to_string(),
            ])
            .await
            .unwrap();

        assert!(cosine(&alone, &batched[0]) > 0.999);
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_similar_texts_are_closer() {
        let model = onnx_model().await;
        let embeddings = model
            .embed_batch(&[
                "A cat sits on the mat".to_string(),
                "A kitten is resting on a rug".to_string(),
                "Quarterly earnings beat analyst expectations".to_string(),
            ])
            .await
            .unwrap();

        let related = cosine(&embeddings[0], &embeddings[1]);
        let unrelated = cosine(&embeddings[0], &embeddings[2]);
        assert!(
            related > unrelated,
            "related {} should exceed unrelated {}",
            related,
            unrelated
        );
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_count_tokens() {
        let model = onnx_model().await;

        let short = model.count_tokens("hello").unwrap();
        let long = model
            .count_tokens("the quick brown fox jumps over the lazy dog")
            .unwrap();

        assert!(short >= 1);
        assert!(long > short);
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_long_input_is_truncated_not_rejected() {
        let model = onnx_model().await;
        let long_text = "word ".repeat(5_000);

        let embedding = model.embed(&long_text).await.unwrap();
        assert_eq!(embedding.len(), model.dimension());
    }
}
