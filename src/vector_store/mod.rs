//! Vector store capability
//!
//! Holds one point per document, keyed by the document id. Upserts fully
//! replace an existing point, which is what makes re-crawls idempotent.

mod qdrant;

pub use qdrant::QdrantStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from the vector store capability
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Vector store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Vector store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed vector store response: {0}")]
    Malformed(String),

    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
}

/// Similarity metric of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
}

/// Shape of the collection documents are indexed into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescriptor {
    pub name: String,
    pub dimensions: usize,
    pub distance: Distance,
}

impl CollectionDescriptor {
    pub fn cosine(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            dimensions,
            distance: Distance::Cosine,
        }
    }
}

/// What `ensure_collection` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The collection did not exist and was created
    Created,
    /// The collection already existed; its vector size when the store reports one
    Existing { dimensions: Option<usize> },
}

/// One vector with its payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// Vector database capability
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection if it is absent; never modifies an existing one
    async fn ensure_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<EnsureOutcome, VectorStoreError>;

    /// Drops the collection if present and creates it afresh
    async fn recreate_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<(), VectorStoreError>;

    /// Inserts or fully replaces the point with the same id
    async fn upsert(&self, collection: &str, point: Point) -> Result<(), VectorStoreError>;

    /// Number of points in the collection
    async fn collection_stats(&self, collection: &str) -> Result<u64, VectorStoreError>;
}
