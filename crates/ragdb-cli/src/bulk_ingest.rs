//! Bulk ingestion CLI: walks a file or directory and ingests every matching
//! document through [`ragdb_core::ingest::IngestionCoordinator`].
//!
//! The walk, filtering, and reporting behavior here is CLI-only ergonomics —
//! `ingestFile`'s documented contract (always re-ingest, replace atomically)
//! is untouched; `--skip-existing` short-circuits *this command's* work via a
//! content-hash sidecar cache, it does not change what a direct `ingestFile`
//! call does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use ragdb_core::embeddings::{EmbeddingProvider, PlaceholderEmbedder};
use ragdb_core::ingest::IngestionCoordinator;
use ragdb_core::vault::VectorStore;
use ragdb_core::Config;

use crate::display::{create_table, print_error, print_info, print_success, print_warning};

const HASH_CACHE_FILE: &str = ".ingest_hashes.json";
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "html", "htm", "json", "pdf", "docx"];

#[derive(Args, Debug)]
pub struct IngestCliArgs {
    /// File or directory to ingest.
    #[arg(long)]
    pub path: PathBuf,

    /// Root directory absolute paths must resolve inside of.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Database directory.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Embedding model cache directory.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Embedding model identifier.
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum individual file size in bytes.
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Embedding batch size for this run.
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Comma-separated list of extensions to include (default: all supported).
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Comma-separated list of substrings; a path containing any is skipped.
    #[arg(long, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Recurse into subdirectories (default).
    #[arg(long, overrides_with = "no_recursive")]
    pub recursive: bool,

    /// Do not recurse into subdirectories.
    #[arg(long, overrides_with = "recursive")]
    pub no_recursive: bool,

    /// Include dotfiles and dot-directories in the walk.
    #[arg(long)]
    pub include_hidden: bool,

    /// Stop walking after this many matching files.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Skip a file whose content hash matches the last recorded ingest.
    #[arg(long, overrides_with = "force")]
    pub skip_existing: bool,

    /// Always re-ingest, even if content is unchanged (default).
    #[arg(long, overrides_with = "skip_existing")]
    pub force: bool,

    /// Walk and report without ingesting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print a progress line every N files.
    #[arg(long, default_value_t = 10)]
    pub progress_every: usize,

    /// Abort on the first ingestion error.
    #[arg(long)]
    pub fail_fast: bool,

    /// Exit with status 1 if any file failed to ingest.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Emit a machine-readable JSON summary instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, Default)]
struct RunSummary {
    total_considered: usize,
    ingested: usize,
    skipped_existing: usize,
    skipped_dry_run: usize,
    failed: usize,
    chunk_total: usize,
    elapsed_secs: f64,
    failures: Vec<FailureEntry>,
}

#[derive(Debug, Serialize, Clone)]
struct FailureEntry {
    path: String,
    message: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct HashCache(HashMap<String, String>);

pub async fn run(args: IngestCliArgs) -> anyhow::Result<i32> {
    let mut config = Config::from_env();
    if let Some(base_dir) = &args.base_dir {
        config.base_dir = base_dir.clone();
    }
    if let Some(db_path) = &args.db_path {
        config.db_path = db_path.clone();
    }
    if let Some(cache_dir) = &args.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    if let Some(model) = &args.model {
        config.model_name = model.clone();
    }
    if let Some(max_file_size) = args.max_file_size {
        config.max_file_size = max_file_size;
    }

    let recursive = !args.no_recursive;
    let extensions: Vec<String> = args
        .extensions
        .clone()
        .unwrap_or_else(|| SUPPORTED_EXTENSIONS.iter().map(|s| s.to_string()).collect())
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let files = walk(&args.path, recursive, args.include_hidden, &extensions, args.exclude.as_deref())?;
    let files: Vec<PathBuf> = match args.max_files {
        Some(n) => files.into_iter().take(n).collect(),
        None => files,
    };

    print_info(&format!("found {} candidate file(s)", files.len()));

    if args.dry_run {
        let summary = RunSummary {
            total_considered: files.len(),
            skipped_dry_run: files.len(),
            ..Default::default()
        };
        for f in &files {
            println!("{}", f.display());
        }
        emit_summary(&summary, args.json);
        return Ok(0);
    }

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(PlaceholderEmbedder::with_model_name(384, config.model_name.clone()));
    let db_file = config.db_path.join("chunks.sqlite");
    let store = VectorStore::open(&db_file)?;
    store.initialize().await?;
    let coordinator = IngestionCoordinator::new(store, embedder, config.clone());

    let mut hash_cache = if args.skip_existing {
        load_hash_cache(&config.db_path)
    } else {
        HashCache::default()
    };

    let started = Instant::now();
    let mut summary = RunSummary {
        total_considered: files.len(),
        ..Default::default()
    };

    let progress = if args.json {
        None
    } else {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(pb)
    };

    for (i, path) in files.iter().enumerate() {
        let path_str = path.display().to_string();

        if args.skip_existing {
            match compute_hash(path) {
                Ok(hash) => {
                    if hash_cache.0.get(&path_str) == Some(&hash) {
                        summary.skipped_existing += 1;
                        if let Some(pb) = &progress {
                            pb.inc(1);
                        }
                        continue;
                    }
                    hash_cache.0.insert(path_str.clone(), hash);
                }
                Err(e) => warn!(path = %path_str, error = %e, "failed to hash file, ingesting anyway"),
            }
        }

        match coordinator.ingest_file(&path_str).await {
            Ok(result) => {
                summary.ingested += 1;
                summary.chunk_total += result.chunk_count;
            }
            Err(e) => {
                summary.failed += 1;
                summary.failures.push(FailureEntry {
                    path: path_str.clone(),
                    message: e.to_string(),
                });
                if args.fail_fast {
                    print_error(&format!("{path_str}: {e}"));
                    break;
                }
            }
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        } else if args.progress_every > 0 && (i + 1) % args.progress_every == 0 {
            print_info(&format!("processed {}/{}", i + 1, files.len()));
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if args.skip_existing {
        if let Err(e) = save_hash_cache(&config.db_path, &hash_cache) {
            warn!(error = %e, "failed to persist hash cache");
        }
    }

    summary.elapsed_secs = started.elapsed().as_secs_f64();
    emit_summary(&summary, args.json);

    let exit_code = if args.fail_on_error && summary.failed > 0 {
        1
    } else {
        0
    };
    Ok(exit_code)
}

fn emit_summary(summary: &RunSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(s) => println!("{s}"),
            Err(e) => print_error(&format!("failed to encode summary: {e}")),
        }
        return;
    }

    let mut table = create_table();
    table.set_header(vec!["metric", "value"]);
    table.add_row(vec!["considered".to_string(), summary.total_considered.to_string()]);
    table.add_row(vec!["ingested".to_string(), summary.ingested.to_string()]);
    table.add_row(vec!["skipped (existing)".to_string(), summary.skipped_existing.to_string()]);
    table.add_row(vec!["failed".to_string(), summary.failed.to_string()]);
    table.add_row(vec!["chunks written".to_string(), summary.chunk_total.to_string()]);
    table.add_row(vec!["elapsed".to_string(), format!("{:.2}s", summary.elapsed_secs)]);
    println!("{table}");

    if summary.failed > 0 {
        print_warning(&format!("{} file(s) failed to ingest:", summary.failed));
        for failure in &summary.failures {
            print_error(&format!("{}: {}", failure.path, failure.message));
        }
    } else if summary.ingested > 0 {
        print_success(&format!("ingested {} file(s)", summary.ingested));
    }
}

fn walk(
    root: &Path,
    recursive: bool,
    include_hidden: bool,
    extensions: &[String],
    exclude: Option<&[String]>,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if root.is_file() {
        if matches_filters(root, include_hidden, extensions, exclude) {
            out.push(root.to_path_buf());
        }
        return Ok(out);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read directory, skipping");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(false);
            if is_hidden && !include_hidden {
                continue;
            }

            if path.is_dir() {
                if recursive {
                    stack.push(path);
                }
                continue;
            }

            if matches_filters(&path, include_hidden, extensions, exclude) {
                out.push(path);
            }
        }
    }

    out.sort();
    Ok(out)
}

fn matches_filters(
    path: &Path,
    _include_hidden: bool,
    extensions: &[String],
    exclude: Option<&[String]>,
) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !extensions.iter().any(|e| e == &ext) {
        return false;
    }

    if let Some(patterns) = exclude {
        let path_str = path.to_string_lossy();
        if patterns.iter().any(|p| !p.is_empty() && path_str.contains(p.as_str())) {
            return false;
        }
    }

    true
}

fn compute_hash(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn hash_cache_path(db_dir: &Path) -> PathBuf {
    db_dir.join(HASH_CACHE_FILE)
}

fn load_hash_cache(db_dir: &Path) -> HashCache {
    let path = hash_cache_path(db_dir);
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn save_hash_cache(db_dir: &Path, cache: &HashCache) -> std::io::Result<()> {
    std::fs::create_dir_all(db_dir)?;
    let encoded = serde_json::to_string(cache).unwrap_or_else(|_| "{}".to_string());
    std::fs::write(hash_cache_path(db_dir), encoded)
}
