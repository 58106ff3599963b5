//! Tool Surface: the five request/response functions a transport adapter
//! (line-delimited JSON over stdio, an HTTP handler, whatever) dispatches
//! onto. No framing lives here — these functions take already-decoded
//! arguments and return already-encodable values.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::embeddings::EmbeddingProvider;
use crate::ingest::{IngestionCoordinator, SourceFormat};
use crate::query::QueryCoordinator;
use crate::raw_data::{normalize_source, raw_data_path};
use crate::vault::{FileEntry, SearchResult, Status};
use crate::{RagError, RagResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFileArgs {
    pub file_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub file_path: String,
    pub chunk_count: usize,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestDataArgs {
    pub content: String,
    pub metadata: IngestDataMetadata,
}

#[derive(Debug, Deserialize)]
pub struct IngestDataMetadata {
    pub source: String,
    pub format: IngestDataFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestDataFormat {
    Text,
    Markdown,
    Html,
}

impl From<IngestDataFormat> for SourceFormat {
    fn from(f: IngestDataFormat) -> Self {
        match f {
            IngestDataFormat::Text => SourceFormat::PlainText,
            IngestDataFormat::Markdown => SourceFormat::Markdown,
            IngestDataFormat::Html => SourceFormat::Html,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryDocumentsArgs {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultEntry {
    pub file_path: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<SearchResult> for QueryResultEntry {
    fn from(r: SearchResult) -> Self {
        Self {
            file_path: r.file_path,
            chunk_index: r.chunk_index,
            text: r.text,
            score: r.distance,
            source: r.source,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntryResponse {
    pub file_path: String,
    pub chunk_count: i64,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<FileEntry> for FileEntryResponse {
    fn from(f: FileEntry) -> Self {
        Self {
            file_path: f.file_path,
            chunk_count: f.chunk_count,
            timestamp: f.timestamp,
            source: f.source,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileArgs {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub file_path: String,
    pub deleted: bool,
    pub timestamp: String,
}

/// Ingest a file already resident on disk.
#[instrument(skip(coordinator))]
pub async fn ingest_file<E: EmbeddingProvider>(
    coordinator: &IngestionCoordinator<E>,
    args: IngestFileArgs,
) -> RagResult<IngestResponse> {
    let result = coordinator.ingest_file(&args.file_path).await?;
    Ok(IngestResponse {
        file_path: result.file_path,
        chunk_count: result.chunk_count,
        timestamp: result.timestamp,
    })
}

/// Ingest inline content under a deterministic raw-data path.
#[instrument(skip(coordinator, args), fields(source = %args.metadata.source))]
pub async fn ingest_data<E: EmbeddingProvider>(
    coordinator: &IngestionCoordinator<E>,
    args: IngestDataArgs,
) -> RagResult<IngestResponse> {
    let result = coordinator
        .ingest_data(&args.content, &args.metadata.source, args.metadata.format.into())
        .await?;
    Ok(IngestResponse {
        file_path: result.file_path,
        chunk_count: result.chunk_count,
        timestamp: result.timestamp,
    })
}

/// Run a hybrid search and shape the store's results for the transport.
#[instrument(skip(coordinator, args))]
pub async fn query_documents<E: EmbeddingProvider>(
    coordinator: &QueryCoordinator<E>,
    args: QueryDocumentsArgs,
) -> RagResult<Vec<QueryResultEntry>> {
    let results = coordinator
        .query_documents(&args.query, args.limit)
        .await?;
    Ok(results.into_iter().map(QueryResultEntry::from).collect())
}

/// List every ingested file with its chunk count and latest timestamp.
pub async fn list_files<E: EmbeddingProvider>(
    coordinator: &QueryCoordinator<E>,
) -> RagResult<Vec<FileEntryResponse>> {
    let mut entries = coordinator.store().list_files().await?;
    for entry in &mut entries {
        entry.source = crate::raw_data::reconstruct_source(
            &coordinator_db_dir(coordinator),
            std::path::Path::new(&entry.file_path),
        );
    }
    Ok(entries.into_iter().map(FileEntryResponse::from).collect())
}

fn coordinator_db_dir<E: EmbeddingProvider>(coordinator: &QueryCoordinator<E>) -> std::path::PathBuf {
    coordinator.db_dir().to_path_buf()
}

/// Delete a file by `filePath` or `source`; at least one is required. For a
/// raw-data target, also removes the on-disk raw-data file (missing file is
/// not an error).
#[instrument(skip(coordinator, args))]
pub async fn delete_file<E: EmbeddingProvider>(
    coordinator: &QueryCoordinator<E>,
    args: DeleteFileArgs,
) -> RagResult<DeleteResponse> {
    let db_dir = coordinator_db_dir(coordinator);
    let file_path = match (args.file_path, args.source) {
        (Some(fp), _) => fp,
        (None, Some(source)) => {
            let normalized = normalize_source(&source);
            raw_data_path(&db_dir, &normalized)
                .to_string_lossy()
                .to_string()
        }
        (None, None) => {
            return Err(RagError::Validation(
                "delete_file requires file_path or source".to_string(),
            ))
        }
    };

    coordinator.store().delete_chunks(&file_path).await?;

    let path = std::path::Path::new(&file_path);
    if path.starts_with(db_dir.join("raw-data")) {
        let _ = tokio::fs::remove_file(path).await;
    }

    Ok(DeleteResponse {
        file_path,
        deleted: true,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Snapshot of store size, health, and FTS status.
pub async fn status<E: EmbeddingProvider>(coordinator: &QueryCoordinator<E>) -> RagResult<Status> {
    coordinator.status().await
}
