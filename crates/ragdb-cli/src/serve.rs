//! Tool transport adapter: line-delimited JSON over stdio.
//!
//! One JSON request per line on stdin, one JSON response per line on stdout.
//! `stdout` is reserved exclusively for protocol frames — every log line goes
//! through `tracing` to `stderr` instead. Each request names one of the five
//! tools in [`ragdb_core::tools`] and carries that tool's argument object;
//! the response wraps the tool's JSON result in a single text block, mirroring
//! the external agent host's tool-call content convention.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, instrument, warn};

use ragdb_core::embeddings::{EmbeddingProvider, PlaceholderEmbedder};
use ragdb_core::ingest::IngestionCoordinator;
use ragdb_core::query::QueryCoordinator;
use ragdb_core::tools;
use ragdb_core::vault::VectorStore;
use ragdb_core::{Config, ErrorKind, RagError};

#[derive(Debug, Deserialize)]
struct ToolRequest {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolResponse {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "isError")]
    is_error: Option<bool>,
    content: Vec<ContentBlock>,
}

fn ok_response(id: Value, payload: impl Serialize) -> ToolResponse {
    let text = serde_json::to_string(&payload).unwrap_or_else(|e| {
        format!(r#"{{"error":"failed to encode result: {e}"}}"#)
    });
    ToolResponse {
        id,
        is_error: None,
        content: vec![ContentBlock { kind: "text", text }],
    }
}

fn error_response(id: Value, err: &RagError, development: bool) -> ToolResponse {
    let kind = match err.kind() {
        ErrorKind::Validation => "VALIDATION",
        ErrorKind::FileOperation => "FILE_OPERATION",
        ErrorKind::Embedding => "EMBEDDING",
        ErrorKind::Database => "DATABASE",
    };
    let message = if development {
        format!("{kind}: {err:?}")
    } else {
        format!("{kind}: {err}")
    };
    ToolResponse {
        id,
        is_error: Some(true),
        content: vec![ContentBlock { kind: "text", text: message }],
    }
}

/// Runs the five-tool dispatch server: embedder and store are opened once
/// (process-wide singletons, lazily constructed here at startup) and shared
/// across every request for the life of the process.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(PlaceholderEmbedder::with_model_name(384, config.model_name.clone()));

    let db_file = config.db_path.join("chunks.sqlite");
    let ingest_store = VectorStore::open(&db_file)?;
    ingest_store.initialize().await?;
    let ingest_coordinator = IngestionCoordinator::new(ingest_store, embedder.clone(), config.clone());

    let query_store = VectorStore::open(&db_file)?;
    query_store.initialize().await?;
    let query_coordinator = QueryCoordinator::new(query_store, embedder, config.clone());

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    tracing::info!(db_path = %config.db_path.display(), "tool server ready");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&line, &ingest_coordinator, &query_coordinator, config.development).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    Ok(())
}

#[instrument(skip_all)]
async fn handle_line(
    line: &str,
    ingest_coordinator: &IngestionCoordinator<Arc<dyn EmbeddingProvider>>,
    query_coordinator: &QueryCoordinator<Arc<dyn EmbeddingProvider>>,
    development: bool,
) -> ToolResponse {
    let request: ToolRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed request line");
            return ToolResponse {
                id: Value::Null,
                is_error: Some(true),
                content: vec![ContentBlock {
                    kind: "text",
                    text: format!("VALIDATION: malformed request: {e}"),
                }],
            };
        }
    };

    debug!(tool = %request.tool, "dispatching tool call");
    let id = request.id.clone();

    match dispatch(request, ingest_coordinator, query_coordinator).await {
        Ok(payload) => ok_response(id, payload),
        Err(err) => {
            error!(error = %err, "tool call failed");
            error_response(id, &err, development)
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> ragdb_core::RagResult<T> {
    serde_json::from_value(args).map_err(|e| RagError::Validation(format!("invalid arguments: {e}")))
}

async fn dispatch(
    request: ToolRequest,
    ingest_coordinator: &IngestionCoordinator<Arc<dyn EmbeddingProvider>>,
    query_coordinator: &QueryCoordinator<Arc<dyn EmbeddingProvider>>,
) -> ragdb_core::RagResult<Value> {
    match request.tool.as_str() {
        "ingest_file" => {
            let args = parse_args(request.args)?;
            let result = tools::ingest_file(ingest_coordinator, args).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "ingest_data" => {
            let args = parse_args(request.args)?;
            let result = tools::ingest_data(ingest_coordinator, args).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "query_documents" => {
            let args = parse_args(request.args)?;
            let result = tools::query_documents(query_coordinator, args).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "list_files" => {
            let result = tools::list_files(query_coordinator).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "delete_file" => {
            let args = parse_args(request.args)?;
            let result = tools::delete_file(query_coordinator, args).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "status" => {
            let result = tools::status(query_coordinator).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        other => Err(RagError::Validation(format!("unknown tool: {other}"))),
    }
}
