//! Configuration module for Site-Indexer
//!
//! This module handles loading, parsing, overriding from the environment and
//! validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use site_indexer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("indexer.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, EmbeddingConfig, OutputConfig, PipelineConfig, PolitenessConfig,
    RetryConfig, UserAgentConfig, VectorStoreConfig, DEFAULT_EXCLUDE_PATTERNS,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
