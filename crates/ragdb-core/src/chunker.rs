//! Semantic Chunker (Max-Min algorithm).
//!
//! Groups sentences into embedding-coherent chunks by walking left to right
//! and deciding, for each candidate sentence, whether it still belongs to the
//! current group. The threshold a candidate must clear grows with group size
//! (via a sigmoid), so groups become harder to extend the longer they get —
//! this keeps chunks from growing unboundedly on homogeneous text while
//! still letting tightly related sentences cluster together.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::sentence::split_sentences;
use crate::RagResult;

static DECORATION_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-=_.*#|~`@!%^&*()\[\]{}\\/<>:+\s]+$").unwrap());

/// A single chunk produced by [`SemanticChunker::chunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
}

/// Tunable parameters of the Max-Min algorithm.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub hard_threshold: f32,
    pub init_const: f32,
    pub c: f32,
    pub min_chunk_length: usize,
    pub window_size: usize,
    pub max_sentences_per_chunk: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            hard_threshold: 0.6,
            init_const: 1.5,
            c: 0.9,
            min_chunk_length: 50,
            window_size: 5,
            max_sentences_per_chunk: 15,
        }
    }
}

/// Groups sentences into chunks via the Max-Min windowed-similarity rule.
pub struct SemanticChunker {
    config: ChunkerConfig,
}

impl SemanticChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `text` into sentences, embed them in one batch, group them, and
    /// return the surviving chunks with sequential zero-based indices.
    ///
    /// Empty input (or input with no non-garbage, long-enough groups)
    /// returns an empty vector.
    #[instrument(skip_all)]
    pub async fn chunk(
        &self,
        text: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> RagResult<Vec<Chunk>> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let refs: Vec<&str> = sentences.iter().map(|s| s.as_str()).collect();
        let embeddings = embedder.embed_batch(&refs).await?;
        debug!(sentence_count = sentences.len(), "chunking sentences");

        let groups = self.group_sentence_indices(&embeddings);

        let mut chunks = Vec::new();
        for group in groups {
            let joined = group
                .iter()
                .map(|&i| sentences[i].as_str())
                .collect::<Vec<_>>()
                .join(" ");

            if joined.len() < self.config.min_chunk_length {
                continue;
            }
            if is_garbage_chunk(&joined) {
                continue;
            }

            chunks.push(Chunk {
                text: joined,
                index: chunks.len(),
            });
        }

        Ok(chunks)
    }

    fn group_sentence_indices(&self, embeddings: &[Vec<f32>]) -> Vec<Vec<usize>> {
        let mut closed_groups: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = vec![0];

        for i in 1..embeddings.len() {
            let candidate = &embeddings[i];

            if current.len() == 1 {
                let s = cosine_similarity(&embeddings[current[0]], candidate);
                if self.config.init_const * s > self.config.hard_threshold {
                    current.push(i);
                } else {
                    closed_groups.push(std::mem::replace(&mut current, vec![i]));
                }
                continue;
            }

            if current.len() >= self.config.max_sentences_per_chunk {
                closed_groups.push(std::mem::replace(&mut current, vec![i]));
                continue;
            }

            let window_start = current.len().saturating_sub(self.config.window_size);
            let window = &current[window_start..];
            let min_sim = windowed_min_similarity(window, embeddings);
            let max_sim = current
                .iter()
                .map(|&j| cosine_similarity(&embeddings[j], candidate))
                .fold(f32::MIN, f32::max);

            let threshold = (self.config.c * min_sim * sigmoid(current.len() as f32))
                .max(self.config.hard_threshold);

            if max_sim > threshold {
                current.push(i);
            } else {
                closed_groups.push(std::mem::replace(&mut current, vec![i]));
            }
        }

        closed_groups.push(current);
        closed_groups
    }
}

/// Minimum pairwise cosine similarity among the members of `window`. Defined
/// as `1.0` (i.e. no constraint) when the window holds fewer than two
/// members, so a freshly started window never blocks an append.
fn windowed_min_similarity(window: &[usize], embeddings: &[Vec<f32>]) -> f32 {
    if window.len() < 2 {
        return 1.0;
    }
    let mut min_sim = f32::MAX;
    for a in 0..window.len() {
        for b in (a + 1)..window.len() {
            let sim = cosine_similarity(&embeddings[window[a]], &embeddings[window[b]]);
            if sim < min_sim {
                min_sim = sim;
            }
        }
    }
    min_sim
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// A chunk is garbage if it has no alphanumeric character at all and either
/// consists entirely of decoration characters, or is dominated (>80%) by a
/// single repeated character.
fn is_garbage_chunk(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.chars().any(|c| c.is_alphanumeric()) {
        return false;
    }

    if DECORATION_ONLY.is_match(trimmed) {
        return true;
    }

    let mut counts = std::collections::HashMap::new();
    for c in trimmed.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
    }
    let total = trimmed.chars().count();
    counts
        .values()
        .any(|&n| (n as f32 / total as f32) > 0.8)
}
