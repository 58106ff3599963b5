//! # ragdb-core — local-first retrieval engine
//!
//! This crate implements the retrieval pipeline behind a local-first
//! Retrieval-Augmented Generation service: ingesting heterogeneous documents,
//! splitting and grouping them into semantically coherent chunks, embedding
//! those chunks with a pluggable local model, and answering queries with a
//! hybrid vector + BM25 search over an embedded SQLite-backed store.
//!
//! ## Architecture
//!
//! - **Sentence splitter** ([`sentence`]): Unicode-aware sentence boundaries
//!   with code-block and heading protection.
//! - **Semantic chunker** ([`chunker`]): groups sentences into chunks with the
//!   Max-Min windowed-similarity algorithm.
//! - **PDF boundary filter** ([`pdf_filter`]): strips repeating header/footer
//!   lines from paginated documents using embedding similarity.
//! - **Title extractor** ([`title`]): per-format display title derivation.
//! - **Raw-data store** ([`raw_data`]): persists inline-ingested content under
//!   a reversible, base64url-derived path.
//! - **Embeddings** ([`embeddings`]): the [`EmbeddingProvider`] capability and
//!   a local placeholder implementation.
//! - **Vector store** ([`vault`]): SQLite-backed chunk storage, FTS lifecycle,
//!   and brute-force vector search.
//! - **Search filters** ([`search`]): hybrid rerank, statistical grouping,
//!   file-quality cap.
//! - **Ingestion / query coordinators** ([`ingest`], [`query`]): the
//!   orchestration layer tying parsing, chunking, embedding, and storage
//!   together.
//! - **Tool handlers** ([`tools`]): the pure request/response functions a
//!   transport adapter dispatches onto.
//!
//! ## Usage Example
//!
//! ```rust,no_run,ignore
//! use ragdb_core::{Config, EmbeddingProvider, PlaceholderEmbedder, VectorStore};
//! use ragdb_core::ingest::IngestionCoordinator;
//!
//! # async fn example() -> ragdb_core::RagResult<()> {
//! let config = Config::from_env();
//! let embedder = PlaceholderEmbedder::new(384);
//! let store = VectorStore::open(&config.db_path)?;
//! let coordinator = IngestionCoordinator::new(store, embedder, config);
//!
//! let result = coordinator.ingest_file("/abs/path/to/doc.md").await?;
//! println!("{} chunks indexed", result.chunk_count);
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod pdf_filter;
pub mod query;
pub mod raw_data;
pub mod search;
pub mod sentence;
pub mod title;
pub mod tools;
pub mod vault;

pub use chunker::{Chunk, ChunkerConfig, SemanticChunker};
pub use config::Config;
pub use embeddings::{EmbeddingProvider, PlaceholderEmbedder};
pub use ingest::{IngestionCoordinator, IngestResult, SourceFormat};
pub use query::QueryCoordinator;
pub use search::{GroupingMode, SearchFilters};
pub use vault::{ChunkRecord, SearchResult, Status, VectorStore};

/// Result type threaded through every fallible operation in this crate.
pub type RagResult<T> = std::result::Result<T, RagError>;

/// Error taxonomy for the retrieval engine.
///
/// Each variant family corresponds to one of the kinds a caller needs to
/// distinguish: a contract violation on the caller's part (`Validation`), an
/// I/O or parser fault on a specific file (`FileOperation`), a model
/// initialization or inference failure (`Embedding`), or a store failure
/// (`Database`). Variant *names* are internal; callers match on kind via
/// [`RagError::kind`].
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("{0}")]
    Validation(String),

    #[error("{path}: {message}")]
    FileOperation { path: String, message: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("store error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Conceptual error kind, exposed for callers shaping tool-error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    FileOperation,
    Embedding,
    Database,
}

impl RagError {
    pub fn file_operation(path: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::FileOperation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Validation(_) => ErrorKind::Validation,
            RagError::FileOperation { .. } => ErrorKind::FileOperation,
            RagError::Embedding(_) => ErrorKind::Embedding,
            RagError::Database(_) => ErrorKind::Database,
            RagError::Io(_) => ErrorKind::FileOperation,
            RagError::Sqlite(_) => ErrorKind::Database,
        }
    }
}
