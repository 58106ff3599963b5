//! Environment-variable driven process configuration.
//!
//! Every field has a hardcoded default; a malformed `RAG_*`/`MAX_FILE_SIZE`
//! value is logged as a warning and the default is substituted rather than
//! failing the process (this tool has no interactive operator to ask).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::search::GroupingMode;

fn default_db_path() -> PathBuf {
    PathBuf::from("./lancedb/")
}

fn default_model_name() -> String {
    "Xenova/all-MiniLM-L6-v2".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./models/")
}

fn default_max_file_size() -> u64 {
    104_857_600
}

fn default_hybrid_weight() -> f32 {
    0.6
}

/// Process-wide configuration, loaded once at startup from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Root directory that every `ingestFile` path must resolve inside of.
    pub base_dir: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    pub max_distance: Option<f32>,
    pub grouping: Option<GroupingMode>,
    pub max_files: Option<usize>,
    #[serde(default = "default_hybrid_weight")]
    pub hybrid_weight: f32,
    /// When true, tool error responses include a debug-formatted cause chain.
    pub development: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            model_name: default_model_name(),
            cache_dir: default_cache_dir(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_file_size: default_max_file_size(),
            max_distance: None,
            grouping: None,
            max_files: None,
            hybrid_weight: default_hybrid_weight(),
            development: false,
        }
    }
}

impl Config {
    /// Build a [`Config`] from the process environment, warning and falling
    /// back to the default for any variable present but malformed.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(v) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MODEL_NAME") {
            config.model_name = v;
        }
        if let Ok(v) = std::env::var("CACHE_DIR") {
            config.cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("BASE_DIR") {
            config.base_dir = PathBuf::from(v);
        }

        if let Ok(v) = std::env::var("MAX_FILE_SIZE") {
            match v.parse::<u64>() {
                Ok(n) => config.max_file_size = n,
                Err(_) => warn!(value = %v, "invalid MAX_FILE_SIZE, using default"),
            }
        }

        if let Ok(v) = std::env::var("RAG_MAX_DISTANCE") {
            match v.parse::<f32>() {
                Ok(n) if n > 0.0 => config.max_distance = Some(n),
                _ => warn!(value = %v, "invalid RAG_MAX_DISTANCE, ignoring"),
            }
        }

        if let Ok(v) = std::env::var("RAG_GROUPING") {
            match v.as_str() {
                "similar" => config.grouping = Some(GroupingMode::Similar),
                "related" => config.grouping = Some(GroupingMode::Related),
                _ => warn!(value = %v, "invalid RAG_GROUPING, ignoring"),
            }
        }

        if let Ok(v) = std::env::var("RAG_MAX_FILES") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => config.max_files = Some(n),
                _ => warn!(value = %v, "invalid RAG_MAX_FILES, ignoring"),
            }
        }

        if let Ok(v) = std::env::var("RAG_HYBRID_WEIGHT") {
            match v.parse::<f32>() {
                Ok(n) if (0.0..=1.0).contains(&n) => config.hybrid_weight = n,
                _ => warn!(value = %v, "invalid RAG_HYBRID_WEIGHT, using default"),
            }
        }

        config.development = std::env::var("NODE_ENV")
            .map(|v| v == "development")
            .unwrap_or(false);

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.max_file_size, 104_857_600);
        assert!((config.hybrid_weight - 0.6).abs() < f32::EPSILON);
        assert!(config.max_distance.is_none());
    }
}
