//! Configuration for the retrieval pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `NG12_` and use double
//! underscores to separate nested levels:
//! - `NG12_CHUNKING__TARGET_CHARS=1500` sets `chunking.target_chars`
//! - `NG12_EMBEDDING__PROVIDER=hashed` sets `embedding.provider`
//! - `NG12_INDEX_PATH=/var/lib/ng12` sets `index_path`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::chunk::ChunkingConfig;

/// Configuration file looked up in the working directory when no explicit
/// path is given.
pub const CONFIG_FILE: &str = "ng12-retrieval.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Directory holding the persisted index artifact
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Short label stamped into chunk ids and citations
    #[serde(default = "default_document_label")]
    pub document_label: String,

    /// Chunk assembly sizes
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding backend selection
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which embedding backend to construct.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Local ONNX model via fastembed (downloads on first use).
    Fastembed,
    /// Deterministic hash-bucket vectors, no model required.
    Hashed,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding backend
    #[serde(default = "default_provider_kind")]
    pub provider: EmbeddingProviderKind,

    /// Model name for the fastembed provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector width for the hashed provider
    #[serde(default = "default_hashed_dimensions")]
    pub hashed_dimensions: usize,

    /// Model download cache directory; fastembed's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Base level applied everywhere (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides (e.g. `outline = "debug"`)
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_index_path() -> PathBuf {
    PathBuf::from("data/index")
}
fn default_document_label() -> String {
    "ng12".to_string()
}
fn default_provider_kind() -> EmbeddingProviderKind {
    EmbeddingProviderKind::Fastembed
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_hashed_dimensions() -> usize {
    256
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            document_label: default_document_label(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider_kind(),
            model: default_embedding_model(),
            hashed_dimensions: default_hashed_dimensions(),
            cache_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources using the default file name.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration layering defaults, the given TOML file (if it
    /// exists), and `NG12_` environment variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Layer in environment variables with NG12_ prefix
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed("NG12_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Validate settings that cannot be expressed through types alone.
    pub fn check(&self) -> Result<(), String> {
        if self.chunking.target_chars == 0 {
            return Err("chunking.target_chars must be greater than zero".to_string());
        }
        if self.chunking.overlap_chars >= self.chunking.target_chars {
            return Err(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.target_chars ({})",
                self.chunking.overlap_chars, self.chunking.target_chars
            ));
        }
        if self.document_label.trim().is_empty() {
            return Err("document_label must not be empty".to_string());
        }
        Ok(())
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
