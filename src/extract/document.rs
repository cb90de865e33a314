use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Structured content extracted from one fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Deterministic id derived from the normalized URL
    pub id: String,

    /// Normalized URL of the page
    pub url: String,

    pub title: String,

    pub meta_description: String,

    /// Cleaned main content text
    pub body_text: String,

    /// Heading texts (h1-h6) in document order
    pub headings: Vec<String>,

    /// First path segment of the URL, `homepage` for the root
    pub category: String,

    pub word_count: usize,

    /// First internal links found on the page
    pub internal_links: Vec<String>,

    pub fetched_at: DateTime<Utc>,
}

/// Computes the document id for a normalized URL
///
/// The id is the first 16 bytes of the URL's SHA-256 digest rendered as a UUID,
/// so the same URL always maps to the same vector-store point.
///
/// # Example
///
/// ```
/// use site_indexer::extract::document_id;
///
/// let a = document_id("https://example.org/about");
/// assert_eq!(a, document_id("https://example.org/about"));
/// assert_ne!(a, document_id("https://example.org/contact"));
/// ```
pub fn document_id(normalized_url: &str) -> String {
    let digest = Sha256::digest(normalized_url.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}
