//! Search Filters: statistical grouping, keyword boost, and file-quality cap.
//!
//! These are pure post-processing passes over a candidate set already
//! fetched from the store ([`crate::vault`]); none of them touch SQLite.
//! Keeping them free of store access makes the grouping-boundary and
//! hybrid-boost arithmetic independently testable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vault::SearchResult;

/// Statistical grouping mode applied to a distance-sorted result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    /// Keep only the first cluster.
    Similar,
    /// Keep the first two clusters.
    Related,
}

/// Search-time filters layered on top of the raw prefetch.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub max_distance: Option<f32>,
    pub grouping: Option<GroupingMode>,
    pub max_files: Option<usize>,
    pub hybrid_weight: f32,
}

/// Cut a distance-ascending result set at a statistical grouping boundary.
///
/// A boundary is any index `i+1` where the gap `d[i+1] - d[i]` exceeds
/// `mean(gaps) + 1.5 * stddev(gaps)`. `similar` keeps everything before the
/// first boundary; `related` keeps everything before the second boundary, or
/// the whole set if at most one boundary exists. Sets of zero or one results
/// are returned unchanged — there is nothing to cluster.
pub fn apply_grouping(results: Vec<SearchResult>, mode: GroupingMode) -> Vec<SearchResult> {
    if results.len() <= 1 {
        return results;
    }

    let distances: Vec<f32> = results.iter().map(|r| r.distance).collect();
    let gaps: Vec<f32> = distances.windows(2).map(|w| w[1] - w[0]).collect();

    let mean = gaps.iter().sum::<f32>() / gaps.len() as f32;
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f32>() / gaps.len() as f32;
    let stddev = variance.sqrt();
    let cutoff_gap = mean + 1.5 * stddev;

    let boundaries: Vec<usize> = gaps
        .iter()
        .enumerate()
        .filter(|(_, &g)| g > cutoff_gap)
        .map(|(i, _)| i + 1)
        .collect();

    match mode {
        GroupingMode::Similar => match boundaries.first() {
            Some(&b) => results.into_iter().take(b).collect(),
            None => results,
        },
        GroupingMode::Related => match boundaries.get(1) {
            Some(&b) => results.into_iter().take(b).collect(),
            None => results,
        },
    }
}

/// Multiplicatively boost distances by normalized BM25 keyword scores.
///
/// `keyword_scores` maps `(filePath, chunkIndex)` to a score already
/// normalized to `[0, 1]` against the maximum score in the candidate set, so
/// a 0 here simply means "no keyword hit". The adjustment is multiplicative
/// rather than additive so that, absent any keyword matches, the ranking is
/// exactly the pure semantic ranking.
pub fn apply_keyword_boost(
    mut results: Vec<SearchResult>,
    keyword_scores: &HashMap<(String, i64), f32>,
    hybrid_weight: f32,
) -> Vec<SearchResult> {
    for result in &mut results {
        let key = (result.file_path.clone(), result.chunk_index);
        let k = keyword_scores.get(&key).copied().unwrap_or(0.0);
        result.distance /= 1.0 + k * hybrid_weight;
    }
    results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
    results
}

/// Normalize a set of raw BM25 scores (SQLite FTS5 convention: more negative
/// is better) so the best hit maps to weight `1.0` and all others scale
/// proportionally.
pub fn normalize_bm25_scores(raw: &HashMap<(String, i64), f64>) -> HashMap<(String, i64), f32> {
    let max_abs = raw.values().map(|v| v.abs()).fold(0.0_f64, f64::max);
    if max_abs == 0.0 {
        return HashMap::new();
    }
    raw.iter()
        .map(|(k, v)| (k.clone(), (v.abs() / max_abs) as f32))
        .collect()
}

/// Retain only chunks belonging to the `max_files` files with the smallest
/// best (minimum) distance, preserving the relative order of surviving
/// chunks.
pub fn apply_file_filter(results: Vec<SearchResult>, max_files: usize) -> Vec<SearchResult> {
    let mut best_per_file: HashMap<String, f32> = HashMap::new();
    for r in &results {
        best_per_file
            .entry(r.file_path.clone())
            .and_modify(|d| {
                if r.distance < *d {
                    *d = r.distance;
                }
            })
            .or_insert(r.distance);
    }

    if best_per_file.len() <= max_files {
        return results;
    }

    let mut files: Vec<(String, f32)> = best_per_file.into_iter().collect();
    files.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    let kept: std::collections::HashSet<String> =
        files.into_iter().take(max_files).map(|(f, _)| f).collect();

    results
        .into_iter()
        .filter(|r| kept.contains(&r.file_path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(file_path: &str, chunk_index: i64, distance: f32) -> SearchResult {
        SearchResult {
            file_path: file_path.to_string(),
            chunk_index,
            text: String::new(),
            distance,
            file_title: None,
            source: None,
        }
    }

    #[test]
    fn grouping_returns_everything_below_two_results() {
        let results = vec![result("a", 0, 0.1)];
        assert_eq!(
            apply_grouping(results.clone(), GroupingMode::Similar).len(),
            1
        );
    }

    #[test]
    fn similar_cuts_at_first_cluster() {
        let results = vec![
            result("a", 0, 0.10),
            result("a", 1, 0.11),
            result("a", 2, 0.12),
            result("b", 0, 0.90),
            result("b", 1, 0.91),
        ];
        let grouped = apply_grouping(results, GroupingMode::Similar);
        assert_eq!(grouped.len(), 3);
        assert!(grouped.iter().all(|r| r.file_path == "a"));
    }

    #[test]
    fn related_keeps_everything_with_one_boundary() {
        let results = vec![
            result("a", 0, 0.10),
            result("a", 1, 0.11),
            result("a", 2, 0.12),
            result("b", 0, 0.90),
            result("b", 1, 0.91),
        ];
        let grouped = apply_grouping(results, GroupingMode::Related);
        assert_eq!(grouped.len(), 5);
    }

    #[test]
    fn keyword_boost_reranks_and_zero_means_absent() {
        let results = vec![result("a", 0, 0.5), result("b", 0, 0.2)];
        let mut scores = HashMap::new();
        scores.insert(("a".to_string(), 0), 1.0);
        let boosted = apply_keyword_boost(results, &scores, 1.0);
        // a: 0.5 / (1 + 1*1) = 0.25, b stays 0.2 -> b still first
        assert_eq!(boosted[0].file_path, "b");

        let results2 = vec![result("a", 0, 0.5), result("b", 0, 0.2)];
        let mut scores2 = HashMap::new();
        scores2.insert(("a".to_string(), 0), 10.0);
        let boosted2 = apply_keyword_boost(results2, &scores2, 1.0);
        assert_eq!(boosted2[0].file_path, "a");
    }

    #[test]
    fn file_filter_keeps_best_files_only() {
        let results = vec![
            result("a", 0, 0.1),
            result("b", 0, 0.2),
            result("c", 0, 0.05),
        ];
        let filtered = apply_file_filter(results, 2);
        let files: std::collections::HashSet<_> =
            filtered.iter().map(|r| r.file_path.clone()).collect();
        assert_eq!(files.len(), 2);
        assert!(files.contains("c"));
        assert!(files.contains("a"));
    }
}
