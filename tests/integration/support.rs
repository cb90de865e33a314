//! Deterministic capability doubles and page builders shared by the integration tests

use async_trait::async_trait;
use site_indexer::config::Config;
use site_indexer::embedding::{Embedder, EmbeddingError};
use site_indexer::vector_store::{
    CollectionDescriptor, EnsureOutcome, Point, VectorStore, VectorStoreError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const DIMS: usize = 8;

/// Embedder that hashes bytes into a fixed-size vector
///
/// Fails for any text containing `fail_marker`.
#[derive(Default)]
pub struct StubEmbedder {
    pub fail_marker: Option<String>,
    pub unavailable: bool,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn dimensions(&self) -> Result<usize, EmbeddingError> {
        if self.unavailable {
            return Err(EmbeddingError::Unavailable("connection refused".into()));
        }
        Ok(DIMS)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(EmbeddingError::Status {
                    status: 500,
                    body: "model crashed".into(),
                });
            }
        }

        let mut vector = vec![0.0f32; DIMS];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % DIMS] += byte as f32 / 255.0;
        }
        Ok(vector)
    }
}

/// Vector store keeping points in a map keyed by id
#[derive(Default)]
pub struct MemoryStore {
    pub points: Mutex<HashMap<String, Point>>,
    pub upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn point_count(&self) -> usize {
        self.points.lock().unwrap().len()
    }

    pub fn payload_field(&self, id: &str, field: &str) -> Option<serde_json::Value> {
        self.points
            .lock()
            .unwrap()
            .get(id)
            .and_then(|p| p.payload.get(field).cloned())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(
        &self,
        _descriptor: &CollectionDescriptor,
    ) -> Result<EnsureOutcome, VectorStoreError> {
        if self.point_count() == 0 {
            Ok(EnsureOutcome::Created)
        } else {
            Ok(EnsureOutcome::Existing {
                dimensions: Some(DIMS),
            })
        }
    }

    async fn recreate_collection(
        &self,
        _descriptor: &CollectionDescriptor,
    ) -> Result<(), VectorStoreError> {
        self.points.lock().unwrap().clear();
        Ok(())
    }

    async fn upsert(&self, _collection: &str, point: Point) -> Result<(), VectorStoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.points.lock().unwrap().insert(point.id.clone(), point);
        Ok(())
    }

    async fn collection_stats(&self, _collection: &str) -> Result<u64, VectorStoreError> {
        Ok(self.point_count() as u64)
    }
}

/// Configuration tuned for fast tests against a local mock server
pub fn test_config(seed: &str) -> Config {
    let mut config = Config::with_seeds(vec![seed.to_string()]);
    config.crawler.max_depth = 1;
    config.crawler.concurrency = 4;
    config.crawler.request_timeout_secs = 5;
    config.politeness.base_delay_ms = 0;
    config.politeness.min_delay_ms = 0;
    config.politeness.jitter_ms = 0;
    config.retry.max_retries = 2;
    config.retry.initial_backoff_ms = 10;
    config.retry.max_backoff_ms = 20;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

/// An HTML page with an article of `words` words and the given links
pub fn article_page(title: &str, words: usize, marker: &str, links: &[&str]) -> String {
    let body: Vec<String> = (0..words).map(|i| format!("word{}", i)).collect();
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!(
        r#"<html><head><title>{title}</title>
        <meta name="description" content="About {title}"></head>
        <body><nav>{anchors}</nav>
        <article><h1>{title}</h1><p>{marker} {body}</p></article>
        </body></html>"#,
        title = title,
        anchors = anchors,
        marker = marker,
        body = body.join(" ")
    )
}

/// A page too short to produce a document
pub fn stub_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!("<html><body><p>Short.</p>{}</body></html>", anchors)
}
