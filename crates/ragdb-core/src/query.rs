//! Query Coordinator: embeds a query, asks the vector store for a hybrid
//! search, and reconstructs `source` for any raw-data hits.

use tracing::instrument;

use crate::embeddings::EmbeddingProvider;
use crate::raw_data::reconstruct_source;
use crate::search::SearchFilters;
use crate::vault::{SearchResult, Status, VectorStore};
use crate::{Config, RagResult};

pub struct QueryCoordinator<E: EmbeddingProvider> {
    store: VectorStore,
    embedder: E,
    config: Config,
}

impl<E: EmbeddingProvider> QueryCoordinator<E> {
    pub fn new(store: VectorStore, embedder: E, config: Config) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn db_dir(&self) -> &std::path::Path {
        &self.config.db_path
    }

    /// Store status, with `searchMode` gated on this coordinator's
    /// configured `hybrid_weight` as well as FTS availability (§4.7.7).
    pub async fn status(&self) -> RagResult<Status> {
        self.store.status(self.config.hybrid_weight).await
    }

    /// Embed `query`, search the store, and fill in `source` for hits whose
    /// `filePath` is a raw-data path. Results are returned in the store's
    /// ascending-distance order.
    #[instrument(skip(self))]
    pub async fn query_documents(&self, query: &str, limit: usize) -> RagResult<Vec<SearchResult>> {
        let vector = self.embedder.embed(query).await?;
        let filters = SearchFilters {
            max_distance: self.config.max_distance,
            grouping: self.config.grouping,
            max_files: self.config.max_files,
            hybrid_weight: self.config.hybrid_weight,
        };

        let mut results = self
            .store
            .search(&vector, Some(query), limit, &filters)
            .await?;

        for result in &mut results {
            if let Some(source) =
                reconstruct_source(&self.config.db_path, std::path::Path::new(&result.file_path))
            {
                result.source = Some(source);
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::PlaceholderEmbedder;
    use crate::ingest::{IngestionCoordinator, SourceFormat};
    use crate::vault::VectorStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn query_returns_ascending_distances_and_reconstructs_source() {
        let base = tempdir().unwrap();
        let db_dir = base.path().join("db");

        let config = Config {
            base_dir: base.path().to_path_buf(),
            db_path: db_dir.clone(),
            ..Config::default()
        };

        let ingest_store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
        let embedder = PlaceholderEmbedder::new(32);
        let coordinator = IngestionCoordinator::new(ingest_store, embedder, config.clone());

        coordinator
            .ingest_data(
                "A sentence about cats and household pets in general for this test. \
                 A second sentence entirely about spacecraft propulsion systems engineering.",
                "https://example.com/article?ref=1",
                SourceFormat::PlainText,
            )
            .await
            .unwrap();

        let query_store = VectorStore::open(&db_dir.join("chunks.sqlite")).unwrap();
        let query_embedder = PlaceholderEmbedder::new(32);
        let query_coordinator = QueryCoordinator::new(query_store, query_embedder, config);

        let results = query_coordinator
            .query_documents("cats and pets", 5)
            .await
            .unwrap();

        assert!(!results.is_empty());
        for w in results.windows(2) {
            assert!(w[0].distance <= w[1].distance);
        }
        assert_eq!(
            results[0].source.as_deref(),
            Some("https://example.com/article")
        );
    }
}
