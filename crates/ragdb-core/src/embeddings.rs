//! Embedding capability: a single `embed`/`embed_batch` trait object passed
//! explicitly into the chunker, PDF filter, and coordinators rather than held
//! as ambient global state.
//!
//! The model runtime itself (tensor execution, tokenizer, weight download)
//! is out of scope here — [`EmbeddingProvider`] is the seam a real model
//! backend plugs into; [`PlaceholderEmbedder`] is a deterministic stand-in
//! used by tests and by callers who have not wired a real model yet.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{RagError, RagResult};

/// A local sentence-embedding model: pure `embed(text) -> vector`, same
/// dimension for every call, L2-normalized output.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text. Rejects an empty string with
    /// [`RagError::Embedding`] — there is no meaningful embedding of nothing.
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>>;

    /// Embed many texts in one batch call.
    async fn embed_batch(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>>;

    /// Fixed output dimension `D`.
    fn dimensions(&self) -> usize;

    /// Model identifier, used only for status/telemetry display.
    fn model_name(&self) -> &str;
}

/// Deterministic placeholder embedder: hashes text into a fixed-dimension,
/// L2-normalized vector. Stands in for a real local model runtime (the
/// tensor execution backend is out of scope of this crate) while still
/// exercising every invariant downstream code depends on — fixed dimension,
/// normalization, and rejection of empty input.
pub struct PlaceholderEmbedder {
    dimensions: usize,
    model_name: String,
}

impl PlaceholderEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_name: "placeholder-embedder".to_string(),
        }
    }

    pub fn with_model_name(dimensions: usize, model_name: impl Into<String>) -> Self {
        Self {
            dimensions,
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for PlaceholderEmbedder {
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        if text.is_empty() {
            return Err(RagError::Embedding(
                "cannot embed an empty string".to_string(),
            ));
        }
        debug!(chars = text.len(), "embedding text");
        let mut v = hash_embedding(text, self.dimensions);
        normalize_embedding(&mut v);
        Ok(v)
    }

    async fn embed_batch(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        debug!(count = texts.len(), "embedding batch");
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Pass-through impl so a single model instance can be shared, via `Arc`,
/// between the ingestion and query coordinators in a long-running process
/// (the coordinators are generic over `E: EmbeddingProvider` rather than a
/// trait object, so this is the seam that lets a process-wide singleton
/// satisfy both).
#[async_trait]
impl EmbeddingProvider for Arc<dyn EmbeddingProvider> {
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        self.as_ref().embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        self.as_ref().embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.as_ref().dimensions()
    }

    fn model_name(&self) -> &str {
        self.as_ref().model_name()
    }
}

fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = hasher.finalize();

    (0..dimensions)
        .map(|i| {
            let byte = hash[i % hash.len()];
            (byte as f32 / 255.0) * 2.0 - 1.0
        })
        .collect()
}

/// Scale a vector to unit L2 length in place. A zero vector is left as-is.
pub fn normalize_embedding(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in embedding.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two vectors of equal length. Returns `0.0` for
/// mismatched lengths or either vector being zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Dot product distance between two L2-normalized vectors: for unit vectors
/// this equals `1 - cosineSimilarity`, smaller is better, matching the
/// store's distance convention.
pub fn dot_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn embedding_is_deterministic_and_normalized() {
        let embedder = PlaceholderEmbedder::new(384);
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn empty_string_is_rejected() {
        let embedder = PlaceholderEmbedder::new(384);
        let err = embedder.embed("").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Embedding);
    }

    #[tokio::test]
    async fn different_text_yields_different_embedding() {
        let embedder = PlaceholderEmbedder::new(384);
        let a = embedder.embed("alpha").await.unwrap();
        let b = embedder.embed("beta").await.unwrap();
        assert_ne!(a, b);
    }
}
