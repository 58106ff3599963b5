//! Raw-Data Store: persists inline-ingested content under a path derived
//! from its normalized source, reversibly.
//!
//! The raw-data file's stem is the base64url encoding of the normalized
//! source, so the original source string can always be recovered from a
//! `filePath` alone without a side table — useful because [`crate::query`]
//! needs to reconstruct `source` for raw-data hits without consulting
//! anything but the path itself.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::RagResult;

const RAW_DATA_SUBDIR: &str = "raw-data";

/// Normalize a source identifier: for `http(s)` URLs, strip the query string
/// and fragment, keeping scheme + authority + path; any other scheme or a
/// non-URL string passes through unchanged. Idempotent by construction —
/// normalizing an already-normalized source is a no-op.
pub fn normalize_source(source: &str) -> String {
    if source.starts_with("http://") || source.starts_with("https://") {
        let cut = source
            .find(['?', '#'])
            .unwrap_or(source.len());
        source[..cut].to_string()
    } else {
        source.to_string()
    }
}

/// Base64url-encode (no padding) a string.
pub fn encode_b64url(s: &str) -> String {
    URL_SAFE_NO_PAD.encode(s.as_bytes())
}

/// Decode a base64url-encoded string back to UTF-8.
pub fn decode_b64url(encoded: &str) -> RagResult<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| crate::RagError::Validation(format!("invalid base64url: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| crate::RagError::Validation(format!("invalid utf-8 in decoded path: {e}")))
}

/// The absolute path a given source's raw-data file lives (or would live)
/// at, under `db_dir`.
pub fn raw_data_path(db_dir: &Path, source: &str) -> PathBuf {
    let normalized = normalize_source(source);
    let stem = encode_b64url(&normalized);
    db_dir.join(RAW_DATA_SUBDIR).join(format!("{stem}.md"))
}

/// Write `content` to the raw-data path derived from `source`, overwriting
/// any existing file, and return the path written to.
pub async fn write_raw_data(db_dir: &Path, source: &str, content: &str) -> RagResult<PathBuf> {
    let path = raw_data_path(db_dir, source);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// If `file_path` lives under `<db_dir>/raw-data/`, recover the original
/// normalized source from its base64url-encoded stem.
pub fn reconstruct_source(db_dir: &Path, file_path: &Path) -> Option<String> {
    let raw_data_dir = db_dir.join(RAW_DATA_SUBDIR);
    let stem = file_path
        .strip_prefix(&raw_data_dir)
        .ok()?
        .file_stem()?
        .to_str()?;
    decode_b64url(stem).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_query_and_fragment() {
        assert_eq!(
            normalize_source("https://ex.com/p?x=1#f"),
            "https://ex.com/p"
        );
        assert_eq!(normalize_source("https://ex.com/p?y=2"), "https://ex.com/p");
    }

    #[test]
    fn normalize_passes_through_other_schemes() {
        assert_eq!(normalize_source("file:///tmp/x.txt"), "file:///tmp/x.txt");
        assert_eq!(normalize_source("my-custom-id-42"), "my-custom-id-42");
    }

    #[test]
    fn normalize_is_idempotent() {
        let cases = [
            "https://ex.com/p?x=1#f",
            "not-a-url",
            "ftp://host/path",
            "",
        ];
        for c in cases {
            let once = normalize_source(c);
            let twice = normalize_source(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn b64url_roundtrip_handles_unicode_and_urls() {
        let cases = [
            "https://ex.com/p?x=1#f",
            "plain text",
            "héllo wörld 日本語",
            "custom:scheme/weird",
        ];
        for c in cases {
            let encoded = encode_b64url(c);
            let decoded = decode_b64url(&encoded).unwrap();
            assert_eq!(decoded, c);
        }
    }

    #[test]
    fn reconstruct_source_recovers_normalized_input() {
        let db_dir = Path::new("/db");
        let path = raw_data_path(db_dir, "https://ex.com/p?x=1#f");
        let recovered = reconstruct_source(db_dir, &path).unwrap();
        assert_eq!(recovered, "https://ex.com/p");
    }

    #[test]
    fn same_normalized_source_yields_same_path() {
        let db_dir = Path::new("/db");
        let a = raw_data_path(db_dir, "https://ex.com/p?x=1#f");
        let b = raw_data_path(db_dir, "https://ex.com/p?y=2");
        assert_eq!(a, b);
    }
}
