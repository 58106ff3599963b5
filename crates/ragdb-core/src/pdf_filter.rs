//! PDF Boundary Filter: strips repeating header/footer sentences from
//! paginated documents using embedding similarity.
//!
//! Page numbers, running titles, and "Page N of M" footers vary in exact
//! text from page to page but cluster tightly in embedding space. Rather
//! than pattern-matching specific formats, this module samples a handful of
//! interior pages, checks whether their first (or last) sentences are
//! mutually similar, and if so drops the corresponding sentence from every
//! page in the document.

use tracing::debug;

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::sentence::split_sentences;
use crate::RagResult;

/// A single positioned text item as emitted by the (out-of-scope) PDF text
/// extractor.
#[derive(Debug, Clone)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub has_eol: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PdfFilterConfig {
    pub similarity_threshold: f32,
    pub min_pages: usize,
    pub sample_pages: usize,
}

impl Default for PdfFilterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            min_pages: 3,
            sample_pages: 5,
        }
    }
}

pub struct PdfBoundaryFilter {
    config: PdfFilterConfig,
}

impl PdfBoundaryFilter {
    pub fn new(config: PdfFilterConfig) -> Self {
        Self { config }
    }

    /// Clean header/footer noise from a full document's pages, returning the
    /// joined text (pages separated by a blank line).
    pub async fn clean(
        &self,
        pages: &[Vec<TextItem>],
        embedder: &dyn EmbeddingProvider,
    ) -> RagResult<String> {
        if pages.len() < self.config.min_pages {
            let joined = pages
                .iter()
                .map(|page| render_lines(page).join(" "))
                .collect::<Vec<_>>()
                .join("\n\n");
            return Ok(joined);
        }

        let sample_indices = self.sample_page_indices(pages.len());

        let mut firsts = Vec::new();
        let mut lasts = Vec::new();
        for &idx in &sample_indices {
            let sentences = page_sentences(&pages[idx]);
            if let Some(first) = sentences.first() {
                firsts.push(first.clone());
            }
            if let Some(last) = sentences.last() {
                lasts.push(last.clone());
            }
        }

        let header_detected = self
            .detect_repeating_boundary(&firsts, embedder)
            .await?;
        let footer_detected = self.detect_repeating_boundary(&lasts, embedder).await?;

        debug!(
            header_detected,
            footer_detected,
            sampled = sample_indices.len(),
            "pdf boundary detection"
        );

        let mut cleaned_pages = Vec::with_capacity(pages.len());
        for page in pages {
            let mut sentences = page_sentences(page);
            if header_detected && !sentences.is_empty() {
                sentences.remove(0);
            }
            if footer_detected && !sentences.is_empty() {
                sentences.pop();
            }
            cleaned_pages.push(sentences.join(" "));
        }

        Ok(cleaned_pages.join("\n\n"))
    }

    fn sample_page_indices(&self, page_count: usize) -> Vec<usize> {
        let center = page_count / 2;
        let half = self.config.sample_pages / 2;
        let start = center.saturating_sub(half);
        let start = start.min(page_count.saturating_sub(self.config.sample_pages));
        let end = (start + self.config.sample_pages).min(page_count);
        (start..end).collect()
    }

    async fn detect_repeating_boundary(
        &self,
        sentences: &[String],
        embedder: &dyn EmbeddingProvider,
    ) -> RagResult<bool> {
        if sentences.len() < 2 {
            return Ok(false);
        }
        let refs: Vec<&str> = sentences.iter().map(|s| s.as_str()).collect();
        let embeddings = embedder.embed_batch(&refs).await?;
        let median = median_pairwise_similarity(&embeddings);
        Ok(median >= self.config.similarity_threshold)
    }
}

/// Group items into lines by rounded Y coordinate (same rounded Y joins into
/// one line, left-to-right by X), then order lines top-to-bottom by
/// descending Y.
fn render_lines(items: &[TextItem]) -> Vec<String> {
    use std::collections::HashMap;

    let mut groups: HashMap<i64, Vec<&TextItem>> = HashMap::new();
    for item in items {
        groups.entry(item.y.round() as i64).or_default().push(item);
    }

    let mut keys: Vec<i64> = groups.keys().copied().collect();
    keys.sort_unstable_by(|a, b| b.cmp(a));

    keys.into_iter()
        .map(|k| {
            let mut line_items = groups.remove(&k).unwrap();
            line_items.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());
            line_items
                .into_iter()
                .map(|i| i.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn page_sentences(items: &[TextItem]) -> Vec<String> {
    let lines = render_lines(items);
    split_sentences(&lines.join("\n"))
}

/// Median of all pairwise cosine similarities among a set of embeddings,
/// used for robustness against outlier pages in the sample.
fn median_pairwise_similarity(embeddings: &[Vec<f32>]) -> f32 {
    let mut sims = Vec::new();
    for i in 0..embeddings.len() {
        for j in (i + 1)..embeddings.len() {
            sims.push(cosine_similarity(&embeddings[i], &embeddings[j]));
        }
    }
    if sims.is_empty() {
        return 0.0;
    }
    sims.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sims.len() / 2;
    if sims.len() % 2 == 0 {
        (sims[mid - 1] + sims[mid]) / 2.0
    } else {
        sims[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::PlaceholderEmbedder;

    fn item(text: &str, x: f32, y: f32) -> TextItem {
        TextItem {
            text: text.to_string(),
            x,
            y,
            font_size: 12.0,
            has_eol: false,
        }
    }

    #[tokio::test]
    async fn below_min_pages_skips_filtering() {
        let pages = vec![
            vec![item("Page one body.", 0.0, 100.0)],
            vec![item("Page two body.", 0.0, 100.0)],
        ];
        let embedder = PlaceholderEmbedder::new(16);
        let filter = PdfBoundaryFilter::new(PdfFilterConfig::default());
        let cleaned = filter.clean(&pages, &embedder).await.unwrap();
        assert!(cleaned.contains("Page one body."));
        assert!(cleaned.contains("Page two body."));
    }

    #[test]
    fn render_lines_orders_top_to_bottom_left_to_right() {
        let items = vec![
            item("world", 10.0, 700.0),
            item("hello", 0.0, 700.0),
            item("footer", 0.0, 50.0),
        ];
        let lines = render_lines(&items);
        assert_eq!(lines[0], "hello world");
        assert_eq!(lines[1], "footer");
    }

    #[test]
    fn median_pairwise_similarity_of_identical_vectors_is_one() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        assert!((median_pairwise_similarity(&embeddings) - 1.0).abs() < 1e-6);
    }
}
