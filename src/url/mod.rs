//! URL handling module for Site-Indexer
//!
//! This module provides URL normalization, host extraction, scope checks
//! against the allowed hosts and exclusion-pattern filtering.

mod domain;
mod filter;
mod normalize;

// Re-export main functions
pub use domain::{extract_host, origin_key, scope_host};
pub use filter::{is_excluded, is_in_scope, CrawlScope, ExclusionRules, LinkVerdict};
pub use normalize::normalize_url;
