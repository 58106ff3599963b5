//! Ingestion Coordinator: validates a source document, parses it by format,
//! extracts a title, chunks and embeds the result, and writes it to the
//! vector store as a single transactional replace.
//!
//! Parsing itself (PDF text extraction, DOCX XML, HTML readability) is out of
//! scope for this crate — [`DocumentParser`] is the seam a real parser plugs
//! into. What lives here is format dispatch, the path/size validation gate,
//! and the zero-chunk data-loss guard that makes re-ingestion safe.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::chunker::SemanticChunker;
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::raw_data::{normalize_source, raw_data_path, write_raw_data};
use crate::title::{
    extract_docx_title, extract_html_title, extract_markdown_title, extract_pdf_title,
    extract_plain_text_title,
};
use crate::vault::{ChunkRecord, VectorStore};
use crate::{RagError, RagResult};

/// The source format dispatched on by [`IngestionCoordinator::ingest_data`];
/// `ingest_file` infers this from the path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    PlainText,
    Markdown,
    Html,
    Json,
    Pdf,
    Docx,
}

impl SourceFormat {
    fn from_extension(ext: &str) -> RagResult<Self> {
        match ext.to_lowercase().as_str() {
            "txt" => Ok(Self::PlainText),
            "md" | "markdown" => Ok(Self::Markdown),
            "html" | "htm" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            other => Err(RagError::Validation(format!(
                "unsupported file extension: {other}"
            ))),
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestResult {
    pub file_path: String,
    pub chunk_count: usize,
    pub timestamp: String,
}

/// A parsed document's plain text plus whatever format-specific hints its
/// title extractor needs (out-of-scope parser integrations feed these in;
/// [`IngestionCoordinator`] only consumes them).
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub text: String,
    pub pdf_metadata_title: Option<String>,
    pub pdf_largest_font_text: Option<String>,
    pub html_title: Option<String>,
    pub docx_first_h1: Option<String>,
}

/// Parses raw bytes for a given format into a [`ParsedDocument`]. The actual
/// PDF/DOCX/HTML backends are out of scope here; this crate ships a
/// dependency-free implementation that covers text, Markdown, and JSON
/// directly and treats PDF/DOCX/HTML as requiring an injected parser.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, format: SourceFormat, bytes: &[u8], file_name: &str) -> RagResult<ParsedDocument>;
}

/// Parses the formats this crate can handle without an external library
/// (plain text, Markdown, JSON flattening) and fails clearly for formats
/// that need a real parser backend (PDF, DOCX, HTML) plugged in by the
/// caller via a different [`DocumentParser`] implementation.
#[derive(Default)]
pub struct BuiltinParser;

impl DocumentParser for BuiltinParser {
    fn parse(&self, format: SourceFormat, bytes: &[u8], file_name: &str) -> RagResult<ParsedDocument> {
        match format {
            SourceFormat::PlainText | SourceFormat::Markdown => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    RagError::file_operation(file_name, format!("invalid utf-8: {e}"))
                })?;
                Ok(ParsedDocument {
                    text,
                    ..Default::default()
                })
            }
            SourceFormat::Json => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    RagError::file_operation(file_name, format!("invalid utf-8: {e}"))
                })?;
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| RagError::file_operation(file_name, format!("invalid json: {e}")))?;
                let mut lines = Vec::new();
                flatten_json(&value, "", &mut lines);
                Ok(ParsedDocument {
                    text: lines.join("\n"),
                    ..Default::default()
                })
            }
            SourceFormat::Pdf | SourceFormat::Docx | SourceFormat::Html => Err(
                RagError::file_operation(file_name, format!("{format:?} requires an external parser backend")),
            ),
        }
    }
}

/// Flatten a JSON value to "key.path: value" lines. Arrays of primitives
/// join with commas on one line; arrays of objects index each entry as
/// `[i]`; an empty object produces no text.
fn flatten_json(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.is_empty() && !prefix.is_empty() {
                return;
            }
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_json(v, &key, out);
            }
        }
        Value::Array(items) => {
            if items.iter().all(is_primitive) {
                let joined = items
                    .iter()
                    .map(value_to_plain_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push(format!("{prefix}: {joined}"));
            } else {
                for (i, item) in items.iter().enumerate() {
                    flatten_json(item, &format!("{prefix}[{i}]"), out);
                }
            }
        }
        other => out.push(format!("{prefix}: {}", value_to_plain_string(other))),
    }
}

fn is_primitive(v: &Value) -> bool {
    !matches!(v, Value::Object(_) | Value::Array(_))
}

fn value_to_plain_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Validates, parses, chunks, embeds, and stores documents.
pub struct IngestionCoordinator<E: EmbeddingProvider, P: DocumentParser = BuiltinParser> {
    store: VectorStore,
    embedder: E,
    parser: P,
    chunker: SemanticChunker,
    config: Config,
}

impl<E: EmbeddingProvider> IngestionCoordinator<E, BuiltinParser> {
    pub fn new(store: VectorStore, embedder: E, config: Config) -> Self {
        Self::with_parser(store, embedder, BuiltinParser, config)
    }
}

impl<E: EmbeddingProvider, P: DocumentParser> IngestionCoordinator<E, P> {
    pub fn with_parser(store: VectorStore, embedder: E, parser: P, config: Config) -> Self {
        Self {
            store,
            embedder,
            parser,
            chunker: SemanticChunker::new(crate::chunker::ChunkerConfig::default()),
            config,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Validate, parse, chunk, embed, and store the file at `path`.
    #[instrument(skip(self))]
    pub async fn ingest_file(&self, path: &str) -> RagResult<IngestResult> {
        let resolved = self.validate_path(path)?;
        self.validate_size(&resolved).await?;

        let file_name = resolved
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let extension = resolved
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let format = SourceFormat::from_extension(&extension)?;

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| RagError::file_operation(resolved.display().to_string(), e.to_string()))?;
        let parsed = self.parser.parse(format, &bytes, &file_name)?;
        let file_size = bytes.len() as i64;

        self.ingest_parsed(&resolved.display().to_string(), &file_name, format, parsed, file_size)
            .await
    }

    /// Persist `content` under a deterministic raw-data path derived from
    /// `source`, then continue as `ingest_file` from title extraction.
    #[instrument(skip(self, content))]
    pub async fn ingest_data(
        &self,
        content: &str,
        source: &str,
        format: SourceFormat,
    ) -> RagResult<IngestResult> {
        let normalized = normalize_source(source);
        let derived_path = raw_data_path(&self.config.db_path, &normalized);

        let markdown_content = if format == SourceFormat::Html {
            let converted = html_to_markdown(content);
            if converted.trim().is_empty() {
                return Err(RagError::file_operation(
                    normalized.clone(),
                    "no extractable content in html input",
                ));
            }
            converted
        } else {
            content.to_string()
        };

        write_raw_data(&self.config.db_path, &normalized, &markdown_content).await?;

        let file_name = derived_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("raw-data.md")
            .to_string();
        let parsed = ParsedDocument {
            text: markdown_content.clone(),
            ..Default::default()
        };
        let file_size = markdown_content.chars().count() as i64;

        self.ingest_parsed(
            &derived_path.display().to_string(),
            &file_name,
            SourceFormat::Markdown,
            parsed,
            file_size,
        )
        .await
    }

    async fn ingest_parsed(
        &self,
        file_path: &str,
        file_name: &str,
        format: SourceFormat,
        parsed: ParsedDocument,
        file_size: i64,
    ) -> RagResult<IngestResult> {
        let title = self.extract_title(format, &parsed, file_name);

        let chunks = self.chunker.chunk(&parsed.text, &self.embedder).await?;
        if chunks.is_empty() {
            return Err(RagError::Validation(format!(
                "{file_path}: chunking produced zero chunks, refusing to replace existing content"
            )));
        }

        let refs: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&refs).await?;

        let timestamp = chrono::Utc::now().to_rfc3339();
        let file_type = format!("{format:?}").to_lowercase();
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(vectors.into_iter())
            .map(|(chunk, vector)| ChunkRecord {
                file_path: file_path.to_string(),
                chunk_index: chunk.index as i64,
                text: chunk.text.clone(),
                vector,
                file_name: file_name.to_string(),
                file_size,
                file_type: file_type.clone(),
                file_title: Some(title.clone()),
                timestamp: timestamp.clone(),
            })
            .collect();

        self.store.replace_chunks(file_path, &records).await?;

        info!(file_path, chunk_count = records.len(), "ingested document");
        Ok(IngestResult {
            file_path: file_path.to_string(),
            chunk_count: records.len(),
            timestamp,
        })
    }

    fn extract_title(&self, format: SourceFormat, parsed: &ParsedDocument, file_name: &str) -> String {
        let result = match format {
            SourceFormat::Markdown => extract_markdown_title(&parsed.text, file_name),
            SourceFormat::PlainText | SourceFormat::Json => {
                extract_plain_text_title(&parsed.text, file_name)
            }
            SourceFormat::Html => extract_html_title(parsed.html_title.as_deref(), file_name),
            SourceFormat::Pdf => extract_pdf_title(
                parsed.pdf_metadata_title.as_deref(),
                parsed.pdf_largest_font_text.as_deref(),
                file_name,
            ),
            SourceFormat::Docx => extract_docx_title(parsed.docx_first_h1.as_deref(), file_name),
        };
        result.title
    }

    /// Require an absolute path, resolve symlinks, and require the resolved
    /// path to lie inside `config.base_dir`.
    fn validate_path(&self, path: &str) -> RagResult<PathBuf> {
        let candidate = Path::new(path);
        if !candidate.is_absolute() {
            return Err(RagError::Validation(format!(
                "path must be absolute: {path}"
            )));
        }

        let resolved = candidate.canonicalize().map_err(|e| {
            RagError::Validation(format!("cannot resolve path {path}: {e}"))
        })?;
        let base = self
            .config
            .base_dir
            .canonicalize()
            .unwrap_or_else(|_| self.config.base_dir.clone());

        if !resolved.starts_with(&base) {
            warn!(path, base_dir = %base.display(), "path escapes base_dir");
            return Err(RagError::Validation(format!(
                "{path} resolves outside the configured BASE_DIR"
            )));
        }

        Ok(resolved)
    }

    async fn validate_size(&self, resolved: &Path) -> RagResult<()> {
        let metadata = tokio::fs::metadata(resolved)
            .await
            .map_err(|e| RagError::file_operation(resolved.display().to_string(), e.to_string()))?;
        if metadata.len() > self.config.max_file_size {
            return Err(RagError::Validation(format!(
                "{}: size {} exceeds max_file_size {}",
                resolved.display(),
                metadata.len(),
                self.config.max_file_size
            )));
        }
        Ok(())
    }
}

/// Best-effort HTML-to-Markdown conversion: strips tags and collapses
/// whitespace. A real readability-style extractor is out of scope here.
fn html_to_markdown(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::PlaceholderEmbedder;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config(base_dir: PathBuf, db_path: PathBuf) -> Config {
        Config {
            base_dir,
            db_path,
            ..Config::default()
        }
    }

    fn coordinator(base_dir: PathBuf, db_path: PathBuf) -> IngestionCoordinator<PlaceholderEmbedder> {
        let store = VectorStore::in_memory().unwrap();
        let embedder = PlaceholderEmbedder::new(32);
        IngestionCoordinator::new(store, embedder, config(base_dir, db_path))
    }

    #[tokio::test]
    async fn ingest_file_rejects_relative_path() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path().to_path_buf(), dir.path().join("db"));
        let err = coord.ingest_file("relative/path.txt").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn ingest_file_rejects_path_outside_base_dir() {
        let base = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let file_path = outside.path().join("doc.txt");
        std::fs::write(&file_path, "hello world. this is outside the base dir.").unwrap();

        let coord = coordinator(base.path().to_path_buf(), base.path().join("db"));
        let err = coord
            .ingest_file(file_path.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn ingest_file_then_query_round_trips() {
        let base = tempdir().unwrap();
        let file_path = base.path().join("doc.md");
        std::fs::write(
            &file_path,
            "# My Document\n\nThis is a long enough sentence about cats and animals to survive chunking. \
             Here is another distinct sentence about quantum physics and particle research for good measure.",
        )
        .unwrap();

        let coord = coordinator(base.path().to_path_buf(), base.path().join("db"));
        let result = coord.ingest_file(file_path.to_str().unwrap()).await.unwrap();
        assert!(result.chunk_count > 0);

        let files = coord.store().list_files().await.unwrap();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn ingest_data_normalizes_source_and_persists_raw_data() {
        let base = tempdir().unwrap();
        let db_dir = base.path().join("db");
        let coord = coordinator(base.path().to_path_buf(), db_dir.clone());

        let content = "A sentence about rust programming and systems design choices made here. \
                        A second sentence about a completely different topic like gardening techniques.";
        let result = coord
            .ingest_data(content, "https://example.com/page?utm=1", SourceFormat::PlainText)
            .await
            .unwrap();

        assert!(result.chunk_count > 0);
        assert!(result.file_path.starts_with(db_dir.join("raw-data").to_str().unwrap()));
    }

    #[tokio::test]
    async fn ingest_rejects_when_chunking_produces_nothing() {
        let base = tempdir().unwrap();
        let file_path = base.path().join("tiny.txt");
        std::fs::write(&file_path, "Hi.").unwrap();

        let coord = coordinator(base.path().to_path_buf(), base.path().join("db"));
        let err = coord
            .ingest_file(file_path.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn json_flattening_handles_nested_and_array_shapes() {
        let value: Value = serde_json::from_str(
            r#"{"name": "doc", "tags": ["a", "b"], "items": [{"id": 1}, {"id": 2}], "empty": {}}"#,
        )
        .unwrap();
        let mut lines = Vec::new();
        flatten_json(&value, "", &mut lines);
        assert!(lines.contains(&"name: doc".to_string()));
        assert!(lines.contains(&"tags: a, b".to_string()));
        assert!(lines.contains(&"items[0].id: 1".to_string()));
        assert!(lines.contains(&"items[1].id: 2".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("empty")));
    }
}
