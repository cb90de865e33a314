//! Site-Indexer: a polite crawl-and-index pipeline
//!
//! This crate crawls a target site, extracts the canonical content of each page,
//! and incrementally maintains a semantic vector index of that content. Re-running
//! a crawl on the same site refreshes index entries in place instead of duplicating them.

pub mod config;
pub mod crawler;
pub mod embedding;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod state;
pub mod url;
pub mod vector_store;

use thiserror::Error;

/// Main error type for Site-Indexer operations
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] embedding::EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] vector_store::VectorStoreError),

    #[error(
        "Collection '{collection}' has {existing} dimensions but the embedder produces {expected}"
    )]
    DimensionMismatch {
        collection: String,
        existing: usize,
        expected: usize,
    },

    #[error("Invalid run state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunState,
        to: state::RunState,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid value for environment variable {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Site-Indexer operations
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{RunController, RunReport};
pub use extract::Document;
pub use pipeline::IngestionPipeline;
pub use state::{RunState, UrlStatus};
pub use url::{is_excluded, is_in_scope, normalize_url, ExclusionRules};
