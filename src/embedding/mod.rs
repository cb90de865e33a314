//! Embedding capability
//!
//! Turns prepared text into a fixed-length vector. The production
//! implementation talks to an OpenAI-compatible HTTP service.

mod http;

pub use http::HttpEmbedder;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the embedding capability
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Embedding service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed embedding response: {0}")]
    Malformed(String),

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),
}

/// Text to vector capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimensionality of the vectors produced, resolved once when the pipeline opens
    async fn dimensions(&self) -> Result<usize, EmbeddingError>;

    /// Embeds one text; implementations truncate inputs beyond their own limits
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Truncates `text` to at most `max_chars` characters without splitting a character
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
